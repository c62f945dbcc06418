//! Connections used by the database health prober.

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("health probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Opens a fresh connection for one probe.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ProbeConnection>, ProbeError>;
}

/// The queries a probe runs against one open connection.
#[async_trait]
pub trait ProbeConnection: Send {
    /// Trivial reachability query.
    async fn ping(&mut self) -> Result<(), ProbeError>;

    async fn table_exists(&mut self, table: &str) -> Result<bool, ProbeError>;

    async fn row_count(&mut self, table: &str) -> Result<i64, ProbeError>;

    /// `CREATE INDEX` statements for every index on `table`.
    async fn index_definitions(&mut self, table: &str) -> Result<Vec<String>, ProbeError>;

    /// Closes the connection. Later calls are no-ops.
    async fn close(&mut self) -> Result<(), ProbeError>;
}

/// Connects to Postgres with a dedicated connection, bypassing the pool so a
/// saturated pool does not read as an unreachable database.
pub struct PgConnector {
    url: String,
}

impl PgConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn ProbeConnection>, ProbeError> {
        let conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;
        Ok(Box::new(PgProbeConnection { conn: Some(conn) }))
    }
}

struct PgProbeConnection {
    conn: Option<PgConnection>,
}

impl PgProbeConnection {
    fn conn(&mut self) -> Result<&mut PgConnection, ProbeError> {
        self.conn
            .as_mut()
            .ok_or_else(|| ProbeError::Query("connection already closed".to_string()))
    }
}

fn query_error(e: sqlx::Error) -> ProbeError {
    ProbeError::Query(e.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl ProbeConnection for PgProbeConnection {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.conn()?)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, ProbeError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(self.conn()?)
        .await
        .map_err(query_error)
    }

    async fn row_count(&mut self, table: &str) -> Result<i64, ProbeError> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .fetch_one(self.conn()?)
            .await
            .map_err(query_error)
    }

    async fn index_definitions(&mut self, table: &str) -> Result<Vec<String>, ProbeError> {
        sqlx::query_scalar::<_, String>(
            "SELECT indexdef FROM pg_indexes WHERE schemaname = 'public' AND tablename = $1 \
             ORDER BY indexname",
        )
        .bind(table)
        .fetch_all(self.conn()?)
        .await
        .map_err(query_error)
    }

    async fn close(&mut self) -> Result<(), ProbeError> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(query_error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("accounts"), "\"accounts\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[tokio::test]
    async fn test_unreachable_database_reports_connect_error() {
        let connector = PgConnector::new("postgres://nobody@127.0.0.1:1/none");
        let result = connector.connect().await;
        assert!(matches!(result, Err(ProbeError::Connect(_))));
    }
}
