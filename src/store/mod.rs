//! Account and client persistence.

pub mod postgres;

pub use postgres::PgAdminStore;

use crate::models::client::NewClientRequest;
use crate::models::{Account, Client};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

impl StoreError {
    /// Whether the store could not be reached at all, as opposed to a query
    /// failing on a live connection.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Database(
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            )
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table operations behind the account/client admin routes.
///
/// Update and delete operations report whether a row was affected.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn account_exists(&self, id: i64) -> StoreResult<bool>;

    async fn account_email_taken(&self, email: &str) -> StoreResult<bool>;

    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Account>;

    async fn update_account_status(&self, id: i64, status: &str) -> StoreResult<bool>;

    /// Removes the account's client links, then the account itself.
    async fn delete_account(&self, id: i64) -> StoreResult<bool>;

    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    async fn client_exists(&self, id: i64) -> StoreResult<bool>;

    async fn find_client_by_email(&self, email: &str) -> StoreResult<Option<Client>>;

    /// Inserts the client and links it to `request.account_id` atomically.
    async fn create_linked_client(&self, request: &NewClientRequest) -> StoreResult<Client>;

    async fn count_account_clients(&self, account_id: i64) -> StoreResult<i64>;

    async fn is_linked(&self, client_id: i64, account_id: i64) -> StoreResult<bool>;

    async fn link_client(&self, client_id: i64, account_id: i64) -> StoreResult<()>;

    async fn unlink_client(&self, client_id: i64, account_id: i64) -> StoreResult<bool>;

    async fn account_clients(&self, account_id: i64) -> StoreResult<Vec<Client>>;

    async fn renew_client(&self, client_id: i64, renewal_date: NaiveDate) -> StoreResult<bool>;
}
