use crate::error::ApiError;
use crate::monitor::{RegistryError, RouteRegistry};
use actix_web::{HttpResponse, web};
use tracing::info;

/// # Account Endpoints
///
/// Account CRUD plus the list of clients linked to an account. Every route is
/// monitored.
///
/// ```text
/// GET    /accounts
/// POST   /accounts
/// POST   /accounts/{id}/status
/// DELETE /accounts/{id}
/// GET    /accounts/{id}/clients
/// ```
pub mod accounts;

/// # Client Endpoints
///
/// Client creation, lookup by email, and account linking (at most five clients
/// per account). Every route is monitored.
pub mod clients;

pub mod graphql;

/// # Health Endpoints
///
/// Application, liveness, database, route and recommendation views. These
/// always answer `200 OK` and are not themselves monitored.
pub mod health;

/// Registers every monitored route. Must run before [`configure`]: the
/// monitoring middleware refuses to start for an unknown identifier.
pub fn register(registry: &RouteRegistry) -> Result<(), RegistryError> {
    for spec in accounts::specs().into_iter().chain(clients::specs()) {
        registry.register(spec)?;
    }
    info!(routes = registry.all()?.len(), "Monitored routes registered");
    Ok(())
}

/// Mounts every API area under the root scope.
pub fn configure(cfg: &mut web::ServiceConfig, registry: &RouteRegistry) {
    cfg.configure(health::configure_routes)
        .configure(|cfg| accounts::configure_routes(cfg, registry))
        .configure(|cfg| clients::configure_routes(cfg, registry))
        .configure(graphql::configure_routes);
}

/// Fallback for unmatched paths.
pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Not found".to_string()))
}
