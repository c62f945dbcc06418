use crate::health::recommendations::{Priority, RecommendationKind};
use crate::health::{ApplicationHealth, HealthChecker, HealthSnapshot, Recommendation};
use crate::monitor::{RouteRegistry, RouteReport, RouteStat};
use async_graphql::{Context, Object, Result, SimpleObject};
use std::sync::Arc;

/// GraphQL view of [`ApplicationHealth`].
#[derive(Debug, SimpleObject)]
pub struct Health {
    pub status: String,
    pub uptime: String,
    /// Milliseconds; null when the last probe measured nothing.
    pub database_latency: Option<f64>,
    pub error: Option<String>,
}

impl From<ApplicationHealth> for Health {
    fn from(health: ApplicationHealth) -> Self {
        Self {
            status: health.status.as_str().to_string(),
            uptime: health.uptime,
            database_latency: health.database_latency,
            error: health.error,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct TableHealth {
    pub name: String,
    pub exists: bool,
    pub row_count: Option<i64>,
    pub indexes: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Debug, SimpleObject)]
pub struct DatabaseHealth {
    pub status: String,
    /// RFC 3339 timestamp of the probe, null before the first probe.
    pub last_check: Option<String>,
    pub error: Option<String>,
    pub connection_time: Option<f64>,
    pub latency: Option<f64>,
    pub tables: Vec<TableHealth>,
}

impl From<&HealthSnapshot> for DatabaseHealth {
    fn from(snapshot: &HealthSnapshot) -> Self {
        Self {
            status: snapshot.status.as_str().to_string(),
            last_check: snapshot.last_check.map(|t| t.to_rfc3339()),
            error: snapshot.error.clone(),
            connection_time: snapshot.connection_time,
            latency: snapshot.latency,
            tables: snapshot
                .tables
                .iter()
                .map(|(name, table)| TableHealth {
                    name: name.clone(),
                    exists: table.exists,
                    row_count: table.row_count,
                    indexes: table.indexes.clone(),
                    error: table.error.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct RouteHealth {
    pub identifier: String,
    pub description: String,
    pub status: String,
    pub last_check: Option<String>,
    pub total_calls: u64,
    pub failed_calls: u64,
    /// Seconds.
    pub avg_response_time: f64,
    pub last_error: Option<String>,
}

impl From<RouteStat> for RouteHealth {
    fn from(stat: RouteStat) -> Self {
        Self {
            identifier: stat.identifier,
            description: stat.description,
            status: stat.status.as_str().to_string(),
            last_check: stat.last_check.map(|t| t.to_rfc3339()),
            total_calls: stat.total_calls,
            failed_calls: stat.failed_calls,
            avg_response_time: stat.avg_response_time,
            last_error: stat.last_error,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct RouteSummary {
    pub status: String,
    pub total: usize,
    pub healthy: usize,
    pub routes: Vec<RouteHealth>,
    pub error: Option<String>,
}

impl From<RouteReport> for RouteSummary {
    fn from(report: RouteReport) -> Self {
        Self {
            status: report.status,
            total: report.total,
            healthy: report.healthy,
            routes: report.routes.into_values().map(RouteHealth::from).collect(),
            error: report.error,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct RecommendationItem {
    pub kind: String,
    pub priority: String,
    pub message: String,
}

impl From<Recommendation> for RecommendationItem {
    fn from(rec: Recommendation) -> Self {
        let kind = match rec.kind {
            RecommendationKind::Index => "index",
            RecommendationKind::Performance => "performance",
            RecommendationKind::Reliability => "reliability",
        };
        let priority = match rec.priority {
            Priority::High => "high",
            Priority::Medium => "medium",
        };
        Self {
            kind: kind.to_string(),
            priority: priority.to_string(),
            message: rec.message,
        }
    }
}

/// Read-only health queries, backed by the same prober and route registry as
/// the REST endpoints.
#[derive(Default)]
pub struct HealthQuery;

#[Object]
impl HealthQuery {
    /// Database status and process uptime.
    async fn health(&self, ctx: &Context<'_>) -> Result<Health> {
        let checker = ctx.data::<Arc<HealthChecker>>()?;
        Ok(checker.check_application().await.into())
    }

    /// Latest database snapshot; `force: true` bypasses the cache.
    async fn database(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] force: bool,
    ) -> Result<DatabaseHealth> {
        let checker = ctx.data::<Arc<HealthChecker>>()?;
        let snapshot = checker.check_database(force).await;
        Ok(DatabaseHealth::from(snapshot.as_ref()))
    }

    /// Per-route call statistics.
    async fn routes(&self, ctx: &Context<'_>) -> Result<RouteSummary> {
        let registry = ctx.data::<RouteRegistry>()?;
        Ok(registry.generate_report().into())
    }

    async fn recommendations(&self, ctx: &Context<'_>) -> Result<Vec<RecommendationItem>> {
        let checker = ctx.data::<Arc<HealthChecker>>()?;
        let registry = ctx.data::<RouteRegistry>()?;
        Ok(checker
            .get_recommendations(registry)
            .into_iter()
            .map(RecommendationItem::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::graphql::schema::create_schema;
    use crate::health::fake::FakeDb;
    use crate::monitor::{RouteRegistry, RouteSpec};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_health_query() {
        let (checker, _db) = FakeDb::with_admin_schema().into_checker();
        let schema = create_schema(Arc::new(checker), RouteRegistry::new());

        let result = schema
            .execute("{ health { status uptime databaseLatency error } }")
            .await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let data = result.data.into_json().unwrap();
        assert_eq!(data["health"]["status"], "healthy");
        assert!(data["health"]["uptime"].is_string());
        assert!(data["health"]["error"].is_null());
    }

    #[tokio::test]
    async fn test_database_query_with_force() {
        let (checker, db) = FakeDb::with_admin_schema().into_checker();
        let schema = create_schema(Arc::new(checker), RouteRegistry::new());

        let query = "{ database { status lastCheck tables { name exists rowCount } } }";
        schema.execute(query).await;
        let result = schema.execute(query).await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(db.connects.load(Ordering::SeqCst), 1);

        let data = result.data.into_json().unwrap();
        assert_eq!(data["database"]["status"], "healthy");
        assert_eq!(data["database"]["tables"][0]["name"], "account_clients");
        assert_eq!(data["database"]["tables"][1]["rowCount"], 12);

        schema.execute("{ database(force: true) { status } }").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_routes_and_recommendations() {
        let registry = RouteRegistry::new();
        registry.register(RouteSpec::new("link_client")).unwrap();
        registry
            .record_failure("link_client", Duration::from_millis(2), "Client not found")
            .unwrap();

        let (checker, _db) = FakeDb::default().into_checker();
        let schema = create_schema(Arc::new(checker), registry);

        let result = schema
            .execute(
                "{ routes { status total healthy routes { identifier failedCalls lastError } } \
                   recommendations { kind priority message } }",
            )
            .await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let data = result.data.into_json().unwrap();
        assert_eq!(data["routes"]["status"], "degraded");
        assert_eq!(data["routes"]["routes"][0]["identifier"], "link_client");
        assert_eq!(data["routes"]["routes"][0]["failedCalls"], 1);
        assert_eq!(data["recommendations"][0]["kind"], "reliability");
        assert_eq!(
            data["recommendations"][0]["message"],
            "High error rate (100.0%) on route link_client"
        );
    }

    #[tokio::test]
    async fn test_missing_context_is_a_graphql_error() {
        use super::HealthQuery;
        use async_graphql::{EmptyMutation, EmptySubscription, Schema};

        let schema = Schema::build(HealthQuery, EmptyMutation, EmptySubscription).finish();
        let result = schema.execute("{ routes { status } }").await;
        assert_eq!(result.errors.len(), 1);
    }
}
