//! # Database Health Prober
//!
//! [`HealthChecker`] probes the backing store with a fresh connection and
//! keeps the result as an immutable [`HealthSnapshot`]. Non-forced checks
//! inside the cache window reuse the current snapshot without touching the
//! database, and at most one probe runs at a time: callers arriving while a
//! probe is in flight wait for it and share its result.
//!
//! Every forced probe, and every probe until one has reached the tables,
//! also inspects the expected tables (existence, row count, index
//! definitions). Cheaper refreshes only run the reachability query and carry
//! the previous table map forward.

pub mod probe;
pub mod recommendations;

pub use probe::{Connector, PgConnector, ProbeConnection, ProbeError};
pub use recommendations::{Recommendation, RecommendationsResponse};

#[cfg(test)]
pub(crate) mod fake;

use crate::config::HealthConfig;
use crate::monitor::RouteRegistry;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl DbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbStatus::Unknown => "unknown",
            DbStatus::Healthy => "healthy",
            DbStatus::Unhealthy => "unhealthy",
        }
    }
}

/// What a full probe learned about one expected table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TableStatus {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableStatus {
    pub fn present(row_count: i64, indexes: Vec<String>) -> Self {
        Self {
            exists: true,
            row_count: Some(row_count),
            indexes: Some(indexes),
            error: None,
        }
    }

    pub fn missing(table: &str) -> Self {
        Self {
            exists: false,
            row_count: None,
            indexes: None,
            error: Some(format!("Table '{table}' does not exist")),
        }
    }

    fn failed(exists: bool, error: ProbeError) -> Self {
        Self {
            exists,
            row_count: None,
            indexes: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of the most recent database probe. Replaced wholesale by every
/// probe, never mutated.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct HealthSnapshot {
    pub status: DbStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Seconds spent on the reachability query.
    pub connection_time: Option<f64>,
    /// Milliseconds spent on the reachability query.
    pub latency: Option<f64>,
    pub tables: BTreeMap<String, TableStatus>,
    #[serde(skip)]
    probed_at: Option<Instant>,
    /// Set once a probe has inspected the expected tables.
    #[serde(skip)]
    tables_inspected: bool,
}

impl HealthSnapshot {
    fn healthy(
        timing: Option<Duration>,
        tables: BTreeMap<String, TableStatus>,
        tables_inspected: bool,
    ) -> Self {
        Self {
            status: DbStatus::Healthy,
            last_check: Some(Utc::now()),
            error: None,
            connection_time: timing.map(|t| t.as_secs_f64()),
            latency: timing.map(|t| t.as_secs_f64() * 1000.0),
            tables,
            probed_at: Some(Instant::now()),
            tables_inspected,
        }
    }

    fn unhealthy(error: &ProbeError, timing: Option<Duration>, previous: &HealthSnapshot) -> Self {
        Self {
            status: DbStatus::Unhealthy,
            last_check: Some(Utc::now()),
            error: Some(error.to_string()),
            connection_time: timing.map(|t| t.as_secs_f64()),
            latency: None,
            tables: previous.tables.clone(),
            probed_at: Some(Instant::now()),
            tables_inspected: previous.tables_inspected,
        }
    }

    fn is_fresh(&self, window: Duration) -> bool {
        self.probed_at.is_some_and(|at| at.elapsed() < window)
    }
}

/// Overall application health derived from the current snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApplicationHealth {
    pub status: DbStatus,
    pub uptime: String,
    /// Milliseconds, or `"N/A"` when no latency was measured.
    #[serde(serialize_with = "latency_or_na")]
    #[schema(value_type = Option<f64>)]
    pub database_latency: Option<f64>,
    pub error: Option<String>,
}

fn latency_or_na<S: Serializer>(latency: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match latency {
        Some(ms) => serializer.serialize_f64(*ms),
        None => serializer.serialize_str("N/A"),
    }
}

/// Formats a duration as `H:MM:SS`, prefixed with `N day(s), ` past 24 hours.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

pub struct HealthChecker {
    connector: Arc<dyn Connector>,
    config: HealthConfig,
    snapshot: RwLock<Arc<HealthSnapshot>>,
    probe_lock: Mutex<()>,
    started: Instant,
}

impl HealthChecker {
    pub fn new(connector: Arc<dyn Connector>, config: HealthConfig) -> Self {
        Self {
            connector,
            config,
            snapshot: RwLock::new(Arc::new(HealthSnapshot::default())),
            probe_lock: Mutex::new(()),
            started: Instant::now(),
        }
    }

    /// The current snapshot, without probing.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, next: Arc<HealthSnapshot>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn cached(&self) -> Option<Arc<HealthSnapshot>> {
        let current = self.snapshot();
        current
            .is_fresh(self.config.cache_window)
            .then_some(current)
    }

    /// Returns the cached snapshot when it is inside the cache window and
    /// `force` is false; otherwise probes and stores a new snapshot.
    pub async fn check_database(&self, force: bool) -> Arc<HealthSnapshot> {
        if !force {
            if let Some(current) = self.cached() {
                return current;
            }
        }

        let _guard = self.probe_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if !force {
            if let Some(current) = self.cached() {
                return current;
            }
        }

        let previous = self.snapshot();
        let full = force || !previous.tables_inspected;
        let next = Arc::new(self.probe(full, &previous).await);
        self.replace(next.clone());
        next
    }

    async fn probe(&self, full: bool, previous: &HealthSnapshot) -> HealthSnapshot {
        let limit = self.config.probe_timeout;

        let mut conn = match time::timeout(limit, self.connector.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Self::failed(e, None, previous),
            Err(_) => return Self::failed(ProbeError::Timeout(limit), None, previous),
        };

        let tables = full.then_some(self.config.expected_tables.as_slice());
        let mut timing = None;
        let outcome = time::timeout(limit, Self::run_checks(conn.as_mut(), tables, &mut timing))
            .await
            .unwrap_or(Err(ProbeError::Timeout(limit)));

        match time::timeout(limit, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to close health probe connection"),
            Err(_) => warn!("Timed out closing health probe connection"),
        }

        match outcome {
            Ok(tables) => {
                let snapshot = match tables {
                    Some(tables) => HealthSnapshot::healthy(timing, tables, true),
                    None => HealthSnapshot::healthy(
                        timing,
                        previous.tables.clone(),
                        previous.tables_inspected,
                    ),
                };
                info!(
                    full,
                    latency_ms = snapshot.latency.unwrap_or_default(),
                    "Database health check completed"
                );
                snapshot
            }
            Err(e) => Self::failed(e, timing, previous),
        }
    }

    fn failed(error: ProbeError, timing: Option<Duration>, previous: &HealthSnapshot) -> HealthSnapshot {
        error!(error = %error, "Database health check failed");
        HealthSnapshot::unhealthy(&error, timing, previous)
    }

    async fn run_checks(
        conn: &mut dyn ProbeConnection,
        tables: Option<&[String]>,
        timing: &mut Option<Duration>,
    ) -> Result<Option<BTreeMap<String, TableStatus>>, ProbeError> {
        let started = Instant::now();
        conn.ping().await?;
        *timing = Some(started.elapsed());

        let Some(tables) = tables else {
            return Ok(None);
        };

        let mut statuses = BTreeMap::new();
        for table in tables {
            statuses.insert(table.clone(), Self::check_table(conn, table).await);
        }
        Ok(Some(statuses))
    }

    async fn check_table(conn: &mut dyn ProbeConnection, table: &str) -> TableStatus {
        match conn.table_exists(table).await {
            Ok(true) => {}
            Ok(false) => return TableStatus::missing(table),
            Err(e) => return TableStatus::failed(false, e),
        }

        let row_count = match conn.row_count(table).await {
            Ok(count) => count,
            Err(e) => return TableStatus::failed(true, e),
        };

        match conn.index_definitions(table).await {
            Ok(indexes) => TableStatus::present(row_count, indexes),
            Err(e) => TableStatus {
                row_count: Some(row_count),
                ..TableStatus::failed(true, e)
            },
        }
    }

    /// Database status plus process uptime. Uses the cached snapshot when it
    /// is still fresh.
    pub async fn check_application(&self) -> ApplicationHealth {
        let db = self.check_database(false).await;
        ApplicationHealth {
            status: db.status,
            uptime: format_uptime(self.started.elapsed()),
            database_latency: db.latency,
            error: db.error.clone(),
        }
    }

    /// Recommendations from the current snapshot and route statistics. Never
    /// probes.
    pub fn get_recommendations(&self, registry: &RouteRegistry) -> Vec<Recommendation> {
        let routes = registry.all().unwrap_or_else(|e| {
            warn!(error = %e, "Route statistics unavailable for recommendations");
            Vec::new()
        });
        recommendations::recommend(&self.snapshot(), &routes)
    }
}
