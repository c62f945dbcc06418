use account_admin::config::AppConfig;
use account_admin::graphql::schema::create_schema;
use account_admin::health::{HealthChecker, PgConnector};
use account_admin::monitor::RouteRegistry;
use account_admin::openapi::ApiDoc;
use account_admin::store::{AdminStore, PgAdminStore};
use account_admin::{logging, routes};
use actix_web::{App, HttpServer, web};
use std::io;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Account Admin service entry point.
///
/// Loads `.env`, registers every monitored route, connects the store lazily
/// and serves:
/// - REST: `/accounts`, `/clients`, `/health/*`
/// - GraphQL: `POST /graphql`, playground at `/playground`
/// - Swagger UI: `/swagger-ui/`, spec at `/api-docs/openapi.json`
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    logging::init(&config.log_level);

    let registry = RouteRegistry::new();
    routes::register(&registry).map_err(io::Error::other)?;

    let pg = PgAdminStore::connect_lazy(&config.database_url, config.db_max_connections)
        .map_err(io::Error::other)?;
    if config.run_migrations {
        pg.run_migrations().await.map_err(io::Error::other)?;
    }
    let store: Arc<dyn AdminStore> = Arc::new(pg);

    let connector = Arc::new(PgConnector::new(&config.database_url));
    let checker = Arc::new(HealthChecker::new(connector, config.health.clone()));
    let schema = create_schema(checker.clone(), registry.clone());

    info!(host = %config.host, port = config.port, "Starting Account Admin API");

    let app_registry = registry.clone();
    let mut server = HttpServer::new(move || {
        let openapi = ApiDoc::openapi();
        let registry = app_registry.clone();

        App::new()
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::from(checker.clone()))
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(schema.clone()))
            .configure(|cfg| routes::configure(cfg, &registry))
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .default_service(web::to(routes::not_found))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind((config.host.as_str(), config.port))?.run().await
}
