use crate::health::{ApplicationHealth, HealthChecker, HealthSnapshot, RecommendationsResponse};
use crate::models::LiveResponse;
use crate::monitor::{RouteRegistry, RouteReport};
use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseQuery {
    pub force: Option<String>,
}

impl DatabaseQuery {
    /// `true` or `1`, case-insensitive. Any other value leaves the cache alone.
    pub fn forced(&self) -> bool {
        self.force
            .as_deref()
            .map(|v| v.trim().to_ascii_lowercase())
            .is_some_and(|v| v == "true" || v == "1")
    }
}

/// # Application Health
///
/// Database status plus process uptime. Always answers `200 OK`; a degraded
/// database shows up in the body.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "uptime": "2:14:07",
///   "database_latency": 3.2,
///   "error": null
/// }
/// ```
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Application health", body = ApplicationHealth)),
    tag = "Health Check"
)]
#[get("/health")]
pub async fn health(checker: web::Data<HealthChecker>) -> impl Responder {
    HttpResponse::Ok().json(checker.check_application().await)
}

/// # Liveness Probe
///
/// Answers `{"status": "UP"}` whenever the process can serve requests.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Service is up", body = LiveResponse)),
    tag = "Health Check"
)]
#[get("/health/live")]
pub async fn live() -> impl Responder {
    HttpResponse::Ok().json(LiveResponse::up())
}

/// # Database Health
///
/// Returns the cached snapshot while it is fresh. `?force=true` (or `1`, any
/// case) always probes the database and inspects the expected tables.
#[utoipa::path(
    get,
    path = "/health/database",
    params(("force" = Option<bool>, Query, description = "Bypass the cache and run a full probe")),
    responses((status = 200, description = "Latest database snapshot", body = HealthSnapshot)),
    tag = "Health Check"
)]
#[get("/health/database")]
pub async fn database(
    checker: web::Data<HealthChecker>,
    query: web::Query<DatabaseQuery>,
) -> impl Responder {
    let snapshot = checker.check_database(query.forced()).await;
    HttpResponse::Ok().json(snapshot.as_ref())
}

/// # Route Report
///
/// Statistics for every monitored route. `status` is `healthy` only when all
/// routes are healthy, `degraded` otherwise.
#[utoipa::path(
    get,
    path = "/health/routes",
    responses((status = 200, description = "Per-route statistics", body = RouteReport)),
    tag = "Health Check"
)]
#[get("/health/routes")]
pub async fn routes(registry: web::Data<RouteRegistry>) -> impl Responder {
    HttpResponse::Ok().json(registry.generate_report())
}

/// # Recommendations
///
/// Suggested fixes from the current database snapshot and route statistics.
/// Never probes the database.
#[utoipa::path(
    get,
    path = "/health/recommendations",
    responses((status = 200, description = "Suggested fixes", body = RecommendationsResponse)),
    tag = "Health Check"
)]
#[get("/health/recommendations")]
pub async fn recommendations(
    checker: web::Data<HealthChecker>,
    registry: web::Data<RouteRegistry>,
) -> impl Responder {
    HttpResponse::Ok().json(RecommendationsResponse {
        recommendations: checker.get_recommendations(&registry),
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(live)
        .service(database)
        .service(routes)
        .service(recommendations);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::fake::FakeDb;
    use crate::monitor::RouteSpec;
    use actix_web::{App, test};
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    macro_rules! app {
        ($checker:expr, $registry:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($checker))
                    .app_data(web::Data::new($registry))
                    .configure(configure_routes),
            )
            .await
        };
    }

    async fn get_json<S>(app: &S, uri: &str) -> Value
    where
        S: actix_web::dev::Service<
                actix_http::Request,
                Response = actix_web::dev::ServiceResponse,
                Error = actix_web::Error,
            >,
    {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), 200, "{uri} should answer 200");
        test::read_body_json(resp).await
    }

    #[actix_web::test]
    async fn test_live() {
        let (checker, db) = FakeDb::default().into_checker();
        let app = app!(checker, RouteRegistry::new());

        let body = get_json(&app, "/health/live").await;
        assert_eq!(body["status"], "UP");
        assert!(body["timestamp"].is_string());
        assert_eq!(db.connects.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_application_health() {
        let (checker, _db) = FakeDb::with_admin_schema().into_checker();
        let app = app!(checker, RouteRegistry::new());

        let body = get_json(&app, "/health").await;
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime"].as_str().unwrap().contains(':'));
        assert!(body["database_latency"].is_number());
    }

    #[actix_web::test]
    async fn test_unhealthy_database_still_answers_ok() {
        let (checker, _db) = FakeDb {
            fail_connect: true,
            ..FakeDb::default()
        }
        .into_checker();
        let app = app!(checker, RouteRegistry::new());

        let body = get_json(&app, "/health").await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["database_latency"], "N/A");

        let body = get_json(&app, "/health/database").await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["error"], "connection failed: connection refused");
    }

    #[actix_web::test]
    async fn test_database_cache_and_force() {
        let (checker, db) = FakeDb::with_admin_schema().into_checker();
        let app = app!(checker, RouteRegistry::new());

        let first = get_json(&app, "/health/database").await;
        let second = get_json(&app, "/health/database").await;
        assert_eq!(first["last_check"], second["last_check"]);
        assert_eq!(db.connects.load(Ordering::SeqCst), 1);
        assert_eq!(first["tables"]["accounts"]["row_count"], 12);

        get_json(&app, "/health/database?force=true").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn test_force_flag_spellings() {
        let (checker, db) = FakeDb::with_admin_schema().into_checker();
        let app = app!(checker, RouteRegistry::new());

        get_json(&app, "/health/database").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 1);

        get_json(&app, "/health/database?force=1").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 2);

        get_json(&app, "/health/database?force=TRUE").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 3);

        // Empty or unrecognised values fall back to the cached snapshot.
        let body = get_json(&app, "/health/database?force=").await;
        assert_eq!(body["status"], "healthy");
        get_json(&app, "/health/database?force=maybe").await;
        assert_eq!(db.connects.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn test_routes_report() {
        let registry = RouteRegistry::new();
        registry.register(RouteSpec::new("list_clients")).unwrap();
        registry.register(RouteSpec::new("add_client")).unwrap();
        registry
            .record_failure("add_client", Duration::from_millis(3), "Client not found")
            .unwrap();

        let (checker, _db) = FakeDb::default().into_checker();
        let app = app!(checker, registry);

        let body = get_json(&app, "/health/routes").await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["total"], 2);
        assert_eq!(body["healthy"], 1);
        assert_eq!(body["routes"]["add_client"]["failed_calls"], 1);
        assert_eq!(body["routes"]["add_client"]["last_error"], "Client not found");
    }

    #[actix_web::test]
    async fn test_recommendations() {
        let registry = RouteRegistry::new();
        registry.register(RouteSpec::new("renew_client")).unwrap();
        registry
            .record_failure("renew_client", Duration::from_millis(3), "boom")
            .unwrap();

        let (checker, _db) = FakeDb::with_admin_schema().into_checker();
        checker.check_database(true).await;
        let app = app!(checker, registry);

        let body = get_json(&app, "/health/recommendations").await;
        let recs = body["recommendations"].as_array().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["type"], "index");
        assert_eq!(recs[1]["type"], "reliability");
        assert_eq!(recs[1]["message"], "High error rate (100.0%) on route renew_client");
    }
}
