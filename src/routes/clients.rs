use crate::error::ApiError;
use crate::models::Client;
use crate::models::client::{
    ClientLookupRequest, ClientLookupResponse, LinkRequest, MAX_CLIENTS_PER_ACCOUNT,
    NewClientRequest, RenewRequest,
};
use crate::monitor::{Monitor, ParamKind, ParamSchema, RouteRegistry, RouteSpec};
use crate::store::AdminStore;
use crate::validation::is_valid_email;
use actix_web::http::Method;
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::info;

fn link_params() -> ParamSchema {
    ParamSchema::new()
        .require(Method::POST, "client_id", ParamKind::Integer)
        .require(Method::POST, "account_id", ParamKind::Integer)
}

/// Monitored client routes, registered once at startup.
pub fn specs() -> Vec<RouteSpec> {
    vec![
        RouteSpec::for_handler(&list_clients).description("List all clients"),
        RouteSpec::for_handler(&add_client)
            .description("Create a client and link it to an account")
            .params(
                ParamSchema::new()
                    .require(Method::POST, "name", ParamKind::String)
                    .require(Method::POST, "email", ParamKind::String)
                    .require(Method::POST, "account_id", ParamKind::Integer)
                    .require(Method::POST, "renewal_date", ParamKind::String),
            ),
        RouteSpec::for_handler(&check_client)
            .description("Look up a client by email")
            .params(ParamSchema::new().require(Method::POST, "email", ParamKind::String)),
        RouteSpec::for_handler(&link_client)
            .description("Link an existing client to an account")
            .params(link_params()),
        RouteSpec::for_handler(&unlink_client)
            .description("Remove a client from an account")
            .params(link_params()),
        RouteSpec::for_handler(&renew_client)
            .description("Set a client's renewal date")
            .params(
                ParamSchema::new()
                    .require(Method::POST, "client_id", ParamKind::Integer)
                    .require(Method::POST, "renewal_date", ParamKind::String),
            ),
    ]
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, registry: &RouteRegistry) {
    let r = registry;

    cfg.service(
        web::resource("/clients")
            .route(
                web::get()
                    .to(list_clients)
                    .wrap(Monitor::for_handler(r.clone(), &list_clients)),
            )
            .route(
                web::post()
                    .to(add_client)
                    .wrap(Monitor::for_handler(r.clone(), &add_client)),
            ),
    )
    .service(
        web::resource("/clients/check").route(
            web::post()
                .to(check_client)
                .wrap(Monitor::for_handler(r.clone(), &check_client)),
        ),
    )
    .service(
        web::resource("/clients/link").route(
            web::post()
                .to(link_client)
                .wrap(Monitor::for_handler(r.clone(), &link_client)),
        ),
    )
    .service(
        web::resource("/clients/unlink").route(
            web::post()
                .to(unlink_client)
                .wrap(Monitor::for_handler(r.clone(), &unlink_client)),
        ),
    )
    .service(
        web::resource("/clients/renew").route(
            web::post()
                .to(renew_client)
                .wrap(Monitor::for_handler(r.clone(), &renew_client)),
        ),
    );
}

fn limit_reached() -> ApiError {
    ApiError::BadRequest(format!(
        "Account already has the maximum of {MAX_CLIENTS_PER_ACCOUNT} clients"
    ))
}

async fn ensure_account(store: &dyn AdminStore, account_id: i64) -> Result<(), ApiError> {
    if store.account_exists(account_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Account not found".to_string()))
    }
}

/// # List Clients
///
/// Every client, newest first.
#[utoipa::path(
    get,
    path = "/clients",
    responses((status = 200, description = "All clients, newest first", body = [Client])),
    tag = "Clients"
)]
pub async fn list_clients(store: web::Data<dyn AdminStore>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(store.list_clients().await?))
}

/// # Add Client
///
/// Creates the client and links it to `account_id` in one transaction.
///
/// ## Responses
/// - **201 Created**: client created and linked
/// - **400 Bad Request**: invalid email, or the account already has five clients
/// - **404 Not Found**: unknown account
/// - **409 Conflict**: a client with this email already exists
#[utoipa::path(
    post,
    path = "/clients",
    request_body = NewClientRequest,
    responses(
        (status = 201, description = "Client created and linked", body = Client),
        (status = 400, description = "Invalid input or client limit reached", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody),
        (status = 409, description = "Client email already exists", body = crate::error::ErrorBody)
    ),
    tag = "Clients"
)]
pub async fn add_client(
    store: web::Data<dyn AdminStore>,
    body: web::Json<NewClientRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut request = body.into_inner();
    request.name = request.name.trim().to_string();
    request.email = request.email.trim().to_lowercase();

    if request.name.is_empty() {
        return Err(ApiError::BadRequest("Client name cannot be empty".to_string()));
    }
    if !is_valid_email(&request.email) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }

    ensure_account(store.get_ref(), request.account_id).await?;

    if store.find_client_by_email(&request.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "A client with this email already exists".to_string(),
        ));
    }
    if store.count_account_clients(request.account_id).await? >= MAX_CLIENTS_PER_ACCOUNT {
        return Err(limit_reached());
    }

    let client = store.create_linked_client(&request).await?;
    info!(client_id = client.id, account_id = request.account_id, "Client created");
    Ok(HttpResponse::Created().json(client))
}

/// # Check Client
///
/// Looks a client up by email. `client` is omitted when none exists.
#[utoipa::path(
    post,
    path = "/clients/check",
    request_body = ClientLookupRequest,
    responses((status = 200, description = "Whether the client exists", body = ClientLookupResponse)),
    tag = "Clients"
)]
pub async fn check_client(
    store: web::Data<dyn AdminStore>,
    body: web::Json<ClientLookupRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = body.email.trim().to_lowercase();
    let client = store.find_client_by_email(&email).await?;

    Ok(HttpResponse::Ok().json(ClientLookupResponse {
        exists: client.is_some(),
        client: client.map(Into::into),
    }))
}

/// # Link Client
///
/// Links an existing client to an account, up to five clients per account.
#[utoipa::path(
    post,
    path = "/clients/link",
    request_body = LinkRequest,
    responses(
        (status = 200, description = "Client linked"),
        (status = 400, description = "Client limit reached", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown client or account", body = crate::error::ErrorBody),
        (status = 409, description = "Already linked", body = crate::error::ErrorBody)
    ),
    tag = "Clients"
)]
pub async fn link_client(
    store: web::Data<dyn AdminStore>,
    body: web::Json<LinkRequest>,
) -> Result<HttpResponse, ApiError> {
    let LinkRequest {
        client_id,
        account_id,
    } = body.into_inner();

    ensure_account(store.get_ref(), account_id).await?;
    if !store.client_exists(client_id).await? {
        return Err(ApiError::NotFound("Client not found".to_string()));
    }
    if store.is_linked(client_id, account_id).await? {
        return Err(ApiError::Conflict(
            "Client is already linked to this account".to_string(),
        ));
    }
    if store.count_account_clients(account_id).await? >= MAX_CLIENTS_PER_ACCOUNT {
        return Err(limit_reached());
    }

    store.link_client(client_id, account_id).await?;
    info!(client_id, account_id, "Client linked");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Client linked",
        "client_id": client_id,
        "account_id": account_id,
    })))
}

/// # Unlink Client
///
/// Removes the link between a client and an account.
#[utoipa::path(
    post,
    path = "/clients/unlink",
    request_body = LinkRequest,
    responses(
        (status = 200, description = "Client unlinked"),
        (status = 404, description = "Client is not linked to the account", body = crate::error::ErrorBody)
    ),
    tag = "Clients"
)]
pub async fn unlink_client(
    store: web::Data<dyn AdminStore>,
    body: web::Json<LinkRequest>,
) -> Result<HttpResponse, ApiError> {
    let LinkRequest {
        client_id,
        account_id,
    } = body.into_inner();

    if !store.unlink_client(client_id, account_id).await? {
        return Err(ApiError::NotFound(
            "Client is not linked to this account".to_string(),
        ));
    }

    info!(client_id, account_id, "Client unlinked");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Client unlinked",
        "client_id": client_id,
        "account_id": account_id,
    })))
}

/// # Renew Client
///
/// Moves a client's renewal date.
///
/// ## Responses
/// - **200 OK**: renewal date updated
/// - **404 Not Found**: unknown client
#[utoipa::path(
    post,
    path = "/clients/renew",
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Renewal date updated"),
        (status = 404, description = "Client not found", body = crate::error::ErrorBody)
    ),
    tag = "Clients"
)]
pub async fn renew_client(
    store: web::Data<dyn AdminStore>,
    body: web::Json<RenewRequest>,
) -> Result<HttpResponse, ApiError> {
    let RenewRequest {
        client_id,
        renewal_date,
    } = body.into_inner();

    if !store.renew_client(client_id, renewal_date).await? {
        return Err(ApiError::NotFound("Client not found".to_string()));
    }

    info!(client_id, %renewal_date, "Client renewed");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Client renewed",
        "client_id": client_id,
        "renewal_date": renewal_date,
    })))
}
