use utoipa::OpenApi;

/// OpenAPI document for the REST surface.
///
/// Served as JSON at `/api-docs/openapi.json` and browsable through Swagger UI
/// at `/swagger-ui/`. The GraphQL endpoint is listed as a tag only; its schema
/// is self-describing.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health,
        crate::routes::health::live,
        crate::routes::health::database,
        crate::routes::health::routes,
        crate::routes::health::recommendations,
        crate::routes::accounts::list_accounts,
        crate::routes::accounts::create_account,
        crate::routes::accounts::update_account_status,
        crate::routes::accounts::delete_account,
        crate::routes::accounts::account_clients,
        crate::routes::clients::list_clients,
        crate::routes::clients::add_client,
        crate::routes::clients::check_client,
        crate::routes::clients::link_client,
        crate::routes::clients::unlink_client,
        crate::routes::clients::renew_client,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::models::LiveResponse,
            crate::models::Account,
            crate::models::account::NewAccountRequest,
            crate::models::account::StatusUpdateRequest,
            crate::models::Client,
            crate::models::ClientSummary,
            crate::models::client::NewClientRequest,
            crate::models::client::ClientLookupRequest,
            crate::models::client::ClientLookupResponse,
            crate::models::client::LinkRequest,
            crate::models::client::RenewRequest,
            crate::models::client::AccountClientsResponse,
            crate::health::ApplicationHealth,
            crate::health::HealthSnapshot,
            crate::health::TableStatus,
            crate::health::DbStatus,
            crate::health::Recommendation,
            crate::health::RecommendationsResponse,
            crate::monitor::RouteReport,
            crate::monitor::RouteStat,
            crate::monitor::RouteStatus,
        )
    ),
    tags(
        (name = "Health Check", description = "Database, route and process health"),
        (name = "Accounts", description = "Account administration"),
        (name = "Clients", description = "Client administration and account linking"),
        (name = "GraphQL", description = "Read-only health queries at /graphql")
    ),
    info(
        description = "Account and client administration with route monitoring and database health checks",
        title = "Account Admin API",
        version = "0.4.0+sprint2",
    )
)]
pub struct ApiDoc;
