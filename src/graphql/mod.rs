//! GraphQL view of the health and route-monitoring data.

pub mod handlers;
pub mod health;
pub mod schema;
