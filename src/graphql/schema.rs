use super::health::HealthQuery;
use crate::health::HealthChecker;
use crate::monitor::RouteRegistry;
use async_graphql::{EmptyMutation, EmptySubscription, Schema};
use std::sync::Arc;

/// Read-only health schema: queries only, no mutations or subscriptions.
pub type AppSchema = Schema<HealthQuery, EmptyMutation, EmptySubscription>;

/// Builds the schema over the shared prober and route registry.
///
/// # Example
///
/// ```rust,no_run
/// use account_admin::config::HealthConfig;
/// use account_admin::graphql::schema::create_schema;
/// use account_admin::health::{HealthChecker, PgConnector};
/// use account_admin::monitor::RouteRegistry;
/// use std::sync::Arc;
///
/// let connector = Arc::new(PgConnector::new("postgres://localhost/admin"));
/// let checker = Arc::new(HealthChecker::new(connector, HealthConfig::default()));
/// let schema = create_schema(checker, RouteRegistry::new());
/// ```
pub fn create_schema(checker: Arc<HealthChecker>, registry: RouteRegistry) -> AppSchema {
    Schema::build(HealthQuery, EmptyMutation, EmptySubscription)
        .data(checker)
        .data(registry)
        .finish()
}
