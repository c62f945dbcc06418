//! # Route Monitoring
//!
//! Per-route call statistics and the middleware that records them.
//!
//! A [`RouteRegistry`] is constructed once at startup, every monitored route
//! is registered with a [`RouteSpec`], and each resource is wrapped with a
//! [`Monitor`] that validates declared parameters and records the outcome of
//! every invocation.

pub mod middleware;
pub mod params;

pub use middleware::Monitor;
pub use params::{ParamKind, ParamSchema, ValidationError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Health of a single route, driven by the outcome of its last invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Healthy,
    Unhealthy,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Healthy => "healthy",
            RouteStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Statistics tracked for one registered route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteStat {
    pub identifier: String,
    pub description: String,
    pub required_params: ParamSchema,
    pub status: RouteStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub total_calls: u64,
    pub failed_calls: u64,
    /// Running mean over every completed call, in seconds.
    pub avg_response_time: f64,
    pub last_error: Option<String>,
}

impl RouteStat {
    fn new(spec: RouteSpec) -> Self {
        Self {
            identifier: spec.identifier,
            description: spec.description,
            required_params: spec.params,
            status: RouteStatus::Healthy,
            last_check: None,
            total_calls: 0,
            failed_calls: 0,
            avg_response_time: 0.0,
            last_error: None,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        let previous = self.total_calls as f64;
        self.total_calls += 1;
        self.avg_response_time =
            (self.avg_response_time * previous + elapsed.as_secs_f64()) / self.total_calls as f64;
        self.last_check = Some(Utc::now());
    }

    fn record_success(&mut self, elapsed: Duration) {
        self.record(elapsed);
        self.status = RouteStatus::Healthy;
    }

    fn record_failure(&mut self, elapsed: Duration, message: String) {
        self.record(elapsed);
        self.failed_calls += 1;
        self.status = RouteStatus::Unhealthy;
        self.last_error = Some(message);
    }

    /// Failed calls as a percentage of all calls; `0.0` before the first call.
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64 * 100.0
        }
    }

    fn reset(&mut self) {
        self.status = RouteStatus::Healthy;
        self.last_check = None;
        self.total_calls = 0;
        self.failed_calls = 0;
        self.avg_response_time = 0.0;
        self.last_error = None;
    }
}

/// Everything needed to register a monitored route.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub identifier: String,
    pub description: String,
    pub params: ParamSchema,
}

impl RouteSpec {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            description: "No description".to_string(),
            params: ParamSchema::new(),
        }
    }

    /// Uses the handler's own function name as the route identifier.
    pub fn for_handler<F>(_handler: &F) -> Self {
        Self::new(handler_name::<F>())
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn params(mut self, params: ParamSchema) -> Self {
        self.params = params;
        self
    }
}

/// Last path segment of a function item's type name, e.g. `list_clients`.
pub fn handler_name<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    full.rsplit("::").next().unwrap_or(full)
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("route not registered: {0}")]
    NotFound(String),

    #[error("route registry lock poisoned")]
    Poisoned,
}

/// Aggregated view over every registered route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteReport {
    /// `healthy` when every route is healthy, otherwise `degraded`;
    /// `error` when the registry could not be read.
    pub status: String,
    pub total: usize,
    pub healthy: usize,
    pub routes: BTreeMap<String, RouteStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteReport {
    fn error(message: String) -> Self {
        Self {
            status: "error".to_string(),
            total: 0,
            healthy: 0,
            routes: BTreeMap::new(),
            error: Some(message),
        }
    }
}

type SharedStat = Arc<Mutex<RouteStat>>;

/// Process-wide route statistics, shared by handle.
///
/// The map itself is only written on registration; each entry has its own
/// lock so concurrent calls to different routes never contend, while calls to
/// the same route serialize their read-modify-write.
#[derive(Clone, Default)]
pub struct RouteRegistry {
    routes: Arc<RwLock<BTreeMap<String, SharedStat>>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route. Re-registering replaces the description and
    /// parameter schema but keeps accumulated statistics.
    pub fn register(&self, spec: RouteSpec) -> Result<(), RegistryError> {
        let mut routes = self.routes.write().map_err(|_| RegistryError::Poisoned)?;

        if let Some(existing) = routes.get(&spec.identifier) {
            let mut stat = existing.lock().map_err(|_| RegistryError::Poisoned)?;
            stat.description = spec.description;
            stat.required_params = spec.params;
            return Ok(());
        }

        debug!(route = %spec.identifier, "Registering monitored route");
        routes.insert(
            spec.identifier.clone(),
            Arc::new(Mutex::new(RouteStat::new(spec))),
        );
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.routes
            .read()
            .map(|routes| routes.contains_key(identifier))
            .unwrap_or(false)
    }

    fn entry(&self, identifier: &str) -> Result<SharedStat, RegistryError> {
        let routes = self.routes.read().map_err(|_| RegistryError::Poisoned)?;
        routes
            .get(identifier)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(identifier.to_string()))
    }

    /// Snapshot of one route's statistics.
    pub fn get(&self, identifier: &str) -> Result<RouteStat, RegistryError> {
        let entry = self.entry(identifier)?;
        let stat = entry.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(stat.clone())
    }

    /// Snapshot of every route, ordered by identifier.
    pub fn all(&self) -> Result<Vec<RouteStat>, RegistryError> {
        let entries: Vec<SharedStat> = {
            let routes = self.routes.read().map_err(|_| RegistryError::Poisoned)?;
            routes.values().cloned().collect()
        };

        entries
            .iter()
            .map(|entry| {
                entry
                    .lock()
                    .map(|stat| stat.clone())
                    .map_err(|_| RegistryError::Poisoned)
            })
            .collect()
    }

    /// The declared parameter schema of a route.
    pub fn params(&self, identifier: &str) -> Result<ParamSchema, RegistryError> {
        Ok(self.get(identifier)?.required_params)
    }

    pub fn record_success(&self, identifier: &str, elapsed: Duration) -> Result<(), RegistryError> {
        let entry = self.entry(identifier)?;
        let mut stat = entry.lock().map_err(|_| RegistryError::Poisoned)?;
        stat.record_success(elapsed);
        debug!(
            route = identifier,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Route call succeeded"
        );
        Ok(())
    }

    pub fn record_failure(
        &self,
        identifier: &str,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let message = message.into();
        error!("Route {} failed: {}", identifier, message);

        let entry = self.entry(identifier)?;
        let mut stat = entry.lock().map_err(|_| RegistryError::Poisoned)?;
        stat.record_failure(elapsed, message);
        Ok(())
    }

    /// Zeroes the statistics of every route, keeping registrations.
    pub fn reset_stats(&self) -> Result<(), RegistryError> {
        let routes = self.routes.read().map_err(|_| RegistryError::Poisoned)?;
        for entry in routes.values() {
            entry.lock().map_err(|_| RegistryError::Poisoned)?.reset();
        }
        Ok(())
    }

    /// Summarises every route. Never fails; an unreadable registry yields an
    /// `error` report instead.
    pub fn generate_report(&self) -> RouteReport {
        match self.all() {
            Ok(stats) => {
                let total = stats.len();
                let healthy = stats
                    .iter()
                    .filter(|stat| stat.status == RouteStatus::Healthy)
                    .count();

                RouteReport {
                    status: if healthy == total { "healthy" } else { "degraded" }.to_string(),
                    total,
                    healthy,
                    routes: stats
                        .into_iter()
                        .map(|stat| (stat.identifier.clone(), stat))
                        .collect(),
                    error: None,
                }
            }
            Err(e) => {
                error!("Error generating route report: {}", e);
                RouteReport::error(e.to_string())
            }
        }
    }
}
