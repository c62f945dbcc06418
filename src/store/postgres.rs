use crate::models::account::DEFAULT_ACCOUNT_STATUS;
use crate::models::client::NewClientRequest;
use crate::models::{Account, Client};
use crate::store::{AdminStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

const ACCOUNT_COLUMNS: &str = "id, email, password, status, created_at, updated_at";
const CLIENT_COLUMNS: &str = "id, name, email, renewal_date, status, created_at, updated_at";

/// Postgres-backed admin store.
#[derive(Clone)]
pub struct PgAdminStore {
    pool: PgPool,
}

impl PgAdminStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool that connects on first use, so the service can start
    /// (and report itself unhealthy) while the database is down.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl AdminStore for PgAdminStore {
    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn account_exists(&self, id: i64) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn account_email_taken(&self, email: &str) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn create_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (email, password, status) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(DEFAULT_ACCOUNT_STATUS)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_account_status(&self, id: i64, status: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE accounts SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM account_clients WHERE account_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn client_exists(&self, id: i64) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_client_by_email(&self, email: &str) -> StoreResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn create_linked_client(&self, request: &NewClientRequest) -> StoreResult<Client> {
        let mut tx = self.pool.begin().await?;
        let client = sqlx::query_as::<_, Client>(&format!(
            "INSERT INTO clients (name, email, renewal_date, status) VALUES ($1, $2, $3, 'active') \
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.email)
        .bind(request.renewal_date)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO account_clients (account_id, client_id) VALUES ($1, $2)")
            .bind(request.account_id)
            .bind(client.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(client)
    }

    async fn count_account_clients(&self, account_id: i64) -> StoreResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM account_clients WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn is_linked(&self, client_id: i64, account_id: i64) -> StoreResult<bool> {
        let linked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM account_clients WHERE client_id = $1 AND account_id = $2)",
        )
        .bind(client_id)
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn link_client(&self, client_id: i64, account_id: i64) -> StoreResult<()> {
        sqlx::query("INSERT INTO account_clients (account_id, client_id) VALUES ($1, $2)")
            .bind(account_id)
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unlink_client(&self, client_id: i64, account_id: i64) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM account_clients WHERE client_id = $1 AND account_id = $2")
                .bind(client_id)
                .bind(account_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn account_clients(&self, account_id: i64) -> StoreResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT c.id, c.name, c.email, c.renewal_date, c.status, c.created_at, c.updated_at \
             FROM clients c \
             JOIN account_clients ac ON ac.client_id = c.id \
             WHERE ac.account_id = $1 \
             ORDER BY ac.created_at",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn renew_client(&self, client_id: i64, renewal_date: NaiveDate) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE clients SET renewal_date = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(renewal_date)
        .bind(client_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
