/// Account rows and the request bodies that create or update them.
pub mod account;

/// Client rows, account links and their request bodies.
pub mod client;

/// # Liveness Response
///
/// `{"status": "UP", "timestamp": "<RFC 3339>"}`, returned while the process
/// is able to serve requests.
pub mod health;

pub use account::Account;
pub use client::{Client, ClientSummary};
pub use health::LiveResponse;
