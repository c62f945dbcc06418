use crate::error::ApiError;
use crate::models::Account;
use crate::models::account::{NewAccountRequest, StatusUpdateRequest};
use crate::models::client::AccountClientsResponse;
use crate::monitor::{Monitor, ParamKind, ParamSchema, RouteRegistry, RouteSpec};
use crate::store::{AdminStore, StoreError};
use crate::validation::{MIN_PASSWORD_LEN, is_strong_password, is_valid_email};
use actix_web::http::Method;
use actix_web::{HttpResponse, web};
use tracing::info;

/// Monitored account routes, registered once at startup.
pub fn specs() -> Vec<RouteSpec> {
    vec![
        RouteSpec::for_handler(&list_accounts).description("List all accounts"),
        RouteSpec::for_handler(&create_account)
            .description("Create an account")
            .params(
                ParamSchema::new()
                    .require(Method::POST, "email", ParamKind::String)
                    .require(Method::POST, "password", ParamKind::String),
            ),
        RouteSpec::for_handler(&update_account_status)
            .description("Change an account's status")
            .params(ParamSchema::new().require(Method::POST, "status", ParamKind::String)),
        RouteSpec::for_handler(&delete_account)
            .description("Delete an account and its client links"),
        RouteSpec::for_handler(&account_clients).description("List clients linked to an account"),
    ]
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, registry: &RouteRegistry) {
    let r = registry;

    cfg.service(
        web::resource("/accounts")
            .route(
                web::get()
                    .to(list_accounts)
                    .wrap(Monitor::for_handler(r.clone(), &list_accounts)),
            )
            .route(
                web::post()
                    .to(create_account)
                    .wrap(Monitor::for_handler(r.clone(), &create_account)),
            ),
    )
    .service(
        web::resource("/accounts/{id}").route(
            web::delete()
                .to(delete_account)
                .wrap(Monitor::for_handler(r.clone(), &delete_account)),
        ),
    )
    .service(
        web::resource("/accounts/{id}/status").route(
            web::post()
                .to(update_account_status)
                .wrap(Monitor::for_handler(r.clone(), &update_account_status)),
        ),
    )
    .service(
        web::resource("/accounts/{id}/clients").route(
            web::get()
                .to(account_clients)
                .wrap(Monitor::for_handler(r.clone(), &account_clients)),
        ),
    );
}

/// # List Accounts
///
/// Every account, newest first.
#[utoipa::path(
    get,
    path = "/accounts",
    responses(
        (status = 200, description = "All accounts, newest first", body = [Account]),
        (status = 503, description = "Database unavailable", body = crate::error::ErrorBody)
    ),
    tag = "Accounts"
)]
pub async fn list_accounts(store: web::Data<dyn AdminStore>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(store.list_accounts().await?))
}

/// # Create Account
///
/// Validates the email format and password strength, rejects duplicate
/// emails, and stores a bcrypt hash of the password. New accounts start as
/// `active`.
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = NewAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Invalid email or weak password", body = crate::error::ErrorBody),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody)
    ),
    tag = "Accounts"
)]
pub async fn create_account(
    store: web::Data<dyn AdminStore>,
    body: web::Json<NewAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let NewAccountRequest { email, password } = body.into_inner();
    let email = email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }
    if !is_strong_password(&password) {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters and contain uppercase, lowercase and numeric characters"
        )));
    }
    if store.account_email_taken(&email).await? {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let hash = web::block(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))?
        .map_err(|e| StoreError::Hash(e.to_string()))?;

    let account = store.create_account(&email, &hash).await?;
    info!(account_id = account.id, "Account created");
    Ok(HttpResponse::Created().json(account))
}

/// # Update Account Status
///
/// Replaces the status of account `id` with any non-empty string.
///
/// ## Responses
/// - **200 OK**: status updated
/// - **400 Bad Request**: missing or empty `status`
/// - **404 Not Found**: unknown account
#[utoipa::path(
    post,
    path = "/accounts/{id}/status",
    params(("id" = i64, Path, description = "Account id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Empty status", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    tag = "Accounts"
)]
pub async fn update_account_status(
    store: web::Data<dyn AdminStore>,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let status = body.status.trim();
    if status.is_empty() {
        return Err(ApiError::BadRequest("Status cannot be empty".to_string()));
    }

    if !store.update_account_status(id, status).await? {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }

    info!(account_id = id, status, "Account status updated");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Account status updated",
        "id": id,
        "status": status,
    })))
}

/// # Delete Account
///
/// Removes the account's client links, then the account itself.
#[utoipa::path(
    delete,
    path = "/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    tag = "Accounts"
)]
pub async fn delete_account(
    store: web::Data<dyn AdminStore>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !store.delete_account(id).await? {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }

    info!(account_id = id, "Account deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// # Account Clients
///
/// Clients currently linked to account `id`.
#[utoipa::path(
    get,
    path = "/accounts/{id}/clients",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Clients linked to the account", body = AccountClientsResponse),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody)
    ),
    tag = "Accounts"
)]
pub async fn account_clients(
    store: web::Data<dyn AdminStore>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if !store.account_exists(id).await? {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }

    let clients = store.account_clients(id).await?;
    Ok(HttpResponse::Ok().json(AccountClientsResponse {
        clients: clients.into_iter().map(Into::into).collect(),
    }))
}
