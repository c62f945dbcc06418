//! In-memory prober connections for tests.

use super::{Connector, HealthChecker, ProbeConnection, ProbeError};
use crate::config::HealthConfig;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time;

#[derive(Default)]
pub(crate) struct FakeDb {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub existence_checks: AtomicUsize,
    pub fail_connect: bool,
    /// Connection attempts to refuse before accepting.
    pub refuse_connects: AtomicUsize,
    pub fail_ping: bool,
    pub ping_delay: Duration,
    /// Table name to (row count, index definitions).
    pub tables: BTreeMap<String, (i64, Vec<String>)>,
}

impl FakeDb {
    /// The admin schema with only the `client_id` link column indexed.
    pub fn with_admin_schema() -> Self {
        Self {
            tables: BTreeMap::from([
                ("accounts".to_string(), (12, vec![])),
                ("clients".to_string(), (40, vec![])),
                (
                    "account_clients".to_string(),
                    (
                        40,
                        vec![
                            "CREATE INDEX idx_account_clients_client_id ON public.account_clients USING btree (client_id)"
                                .to_string(),
                        ],
                    ),
                ),
            ]),
            ..Self::default()
        }
    }

    pub fn into_checker(self) -> (HealthChecker, Arc<FakeDb>) {
        let db = Arc::new(self);
        let checker =
            HealthChecker::new(Arc::new(FakeConnector(db.clone())), HealthConfig::default());
        (checker, db)
    }
}

pub(crate) struct FakeConnector(pub Arc<FakeDb>);

struct FakeConnection(Arc<FakeDb>);

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn ProbeConnection>, ProbeError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .0
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.0.fail_connect || refused {
            return Err(ProbeError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(FakeConnection(self.0.clone())))
    }
}

#[async_trait]
impl ProbeConnection for FakeConnection {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        if !self.0.ping_delay.is_zero() {
            time::sleep(self.0.ping_delay).await;
        }
        if self.0.fail_ping {
            return Err(ProbeError::Query("server closed the connection".to_string()));
        }
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool, ProbeError> {
        self.0.existence_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.0.tables.contains_key(table))
    }

    async fn row_count(&mut self, table: &str) -> Result<i64, ProbeError> {
        self.0
            .tables
            .get(table)
            .map(|(rows, _)| *rows)
            .ok_or_else(|| ProbeError::Query(format!("relation \"{table}\" does not exist")))
    }

    async fn index_definitions(&mut self, table: &str) -> Result<Vec<String>, ProbeError> {
        Ok(self
            .0
            .tables
            .get(table)
            .map(|(_, indexes)| indexes.clone())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), ProbeError> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
