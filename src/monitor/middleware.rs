use crate::error::ApiError;
use crate::monitor::params::{self, ParamSource};
use crate::monitor::{RegistryError, RouteRegistry, handler_name};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{Error, HttpMessage, web};
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};
use std::future::{Ready, ready};
use std::rc::Rc;
use std::time::Instant;
use tracing::error;

/// Instrumentation for one monitored route.
///
/// Wrap a resource with `Monitor::new(registry, "identifier")`. The identifier
/// must already be registered; building the service fails otherwise.
pub struct Monitor {
    registry: RouteRegistry,
    route: Rc<str>,
}

impl Monitor {
    pub fn new(registry: RouteRegistry, route: impl AsRef<str>) -> Self {
        Self {
            registry,
            route: Rc::from(route.as_ref()),
        }
    }

    /// Monitors under the handler's own function name, matching
    /// [`RouteSpec::for_handler`](crate::monitor::RouteSpec::for_handler).
    pub fn for_handler<F>(registry: RouteRegistry, _handler: &F) -> Self {
        Self::new(registry, handler_name::<F>())
    }
}

impl<S, B> Transform<S, ServiceRequest> for Monitor
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MonitorMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        if !self.registry.contains(&self.route) {
            error!(route = %self.route, "Monitored route was never registered");
            return ready(Err(()));
        }

        ready(Ok(MonitorMiddleware {
            service: Rc::new(service),
            registry: self.registry.clone(),
            route: Rc::clone(&self.route),
        }))
    }
}

pub struct MonitorMiddleware<S> {
    service: Rc<S>,
    registry: RouteRegistry,
    route: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for MonitorMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let registry = self.registry.clone();
        let route = Rc::clone(&self.route);

        Box::pin(async move {
            let started = Instant::now();

            if let Err(e) = check_params(&registry, &route, &mut req).await {
                let recorded = registry.record_failure(&route, started.elapsed(), e.to_string());
                log_unrecorded(&route, recorded);
                return Err(e);
            }

            match service.call(req).await {
                Ok(res) => {
                    let elapsed = started.elapsed();
                    let failure = match res.response().error() {
                        Some(e) => Some(e.to_string()),
                        None if res.status().is_server_error() => {
                            Some(res.status().to_string())
                        }
                        None => None,
                    };

                    let recorded = match failure {
                        Some(message) => registry.record_failure(&route, elapsed, message),
                        None => registry.record_success(&route, elapsed),
                    };
                    log_unrecorded(&route, recorded);
                    Ok(res)
                }
                Err(e) => {
                    let recorded = registry.record_failure(&route, started.elapsed(), e.to_string());
                    log_unrecorded(&route, recorded);
                    Err(e)
                }
            }
        })
    }
}

fn log_unrecorded(route: &str, recorded: Result<(), RegistryError>) {
    if let Err(e) = recorded {
        error!(route = %route, error = %e, "Could not record route statistics");
    }
}

/// Validates the declared parameters for the request's method, if any.
///
/// Body parameters are buffered and put back so the handler still sees the
/// original payload.
async fn check_params(
    registry: &RouteRegistry,
    route: &str,
    req: &mut ServiceRequest,
) -> Result<(), Error> {
    let schema = registry.params(route).map_err(ApiError::from)?;
    let Some(declared) = schema.for_method(req.method()) else {
        return Ok(());
    };

    let source = ParamSource::select(req.method(), req.content_type());
    let values: Map<String, Value> = match source {
        ParamSource::Query => params::from_urlencoded(req.query_string()),
        ParamSource::Json | ParamSource::Form => {
            let body = req.extract::<web::Bytes>().await?;
            let parsed = if source == ParamSource::Json {
                params::from_json(&body)
            } else {
                params::from_urlencoded(&String::from_utf8_lossy(&body))
            };
            restore_payload(req, body);
            parsed
        }
    }
    .map_err(ApiError::from)?;

    params::validate(declared, &values).map_err(ApiError::from)?;
    Ok(())
}

fn restore_payload(req: &mut ServiceRequest, body: web::Bytes) {
    let (_, mut payload) = actix_http::h1::Payload::create(true);
    payload.unread_data(body);
    req.set_payload(payload.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ParamKind, ParamSchema, RouteSpec, RouteStatus};
    use actix_web::http::{Method, StatusCode};
    use actix_web::{App, HttpResponse, test};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> RouteRegistry {
        let registry = RouteRegistry::new();
        registry
            .register(
                RouteSpec::new("get_item").params(
                    ParamSchema::new()
                        .require(Method::GET, "id", ParamKind::Integer)
                        .require(Method::POST, "id", ParamKind::Integer)
                        .require(Method::POST, "active", ParamKind::Boolean),
                ),
            )
            .unwrap();
        registry.register(RouteSpec::new("broken")).unwrap();
        registry
    }

    #[actix_web::test]
    async fn test_success_is_recorded() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::get().to(|| async { HttpResponse::Ok().body("ok") })),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/item?id=7").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let stat = registry.get("get_item").unwrap();
        assert_eq!(stat.total_calls, 1);
        assert_eq!(stat.failed_calls, 0);
        assert_eq!(stat.status, RouteStatus::Healthy);
        assert!(stat.last_check.is_some());
    }

    #[actix_web::test]
    async fn test_invalid_integer_never_reaches_handler() {
        let registry = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::get().to(move || {
                        let counter = Arc::clone(&counter);
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            HttpResponse::Ok().finish()
                        }
                    })),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/item?id=abc").to_request();
        let err = app.call(req).await.err().expect("validation should reject");

        assert_eq!(err.as_response_error().status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let stat = registry.get("get_item").unwrap();
        assert_eq!(stat.total_calls, 1);
        assert_eq!(stat.failed_calls, 1);
        assert_eq!(stat.status, RouteStatus::Unhealthy);
        assert_eq!(
            stat.last_error.as_deref(),
            Some("parameter id must be an integer")
        );
    }

    #[actix_web::test]
    async fn test_empty_json_body_fails_validation() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::post().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/item")
            .set_json(json!({}))
            .to_request();
        let err = app.call(req).await.err().expect("validation should reject");
        assert_eq!(err.as_response_error().status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "missing required parameter: active");

        let stat = registry.get("get_item").unwrap();
        assert_eq!(stat.total_calls, 1);
        assert_eq!(stat.failed_calls, 1);
    }

    #[actix_web::test]
    async fn test_json_body_is_still_readable_by_handler() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::post().to(|body: web::Json<Value>| async move {
                        HttpResponse::Ok().json(body.into_inner())
                    })),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/item")
            .set_json(json!({"id": "12", "active": "TRUE"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let echoed: Value = test::read_body_json(resp).await;
        assert_eq!(echoed["id"], "12");
        assert_eq!(registry.get("get_item").unwrap().failed_calls, 0);
    }

    #[actix_web::test]
    async fn test_form_body_is_validated() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::post().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/item")
            .insert_header(("content-type", "application/x-www-form-urlencoded"))
            .set_payload("id=3&active=maybe")
            .to_request();
        let err = app.call(req).await.err().expect("validation should reject");
        assert_eq!(err.as_response_error().status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            registry.get("get_item").unwrap().last_error.as_deref(),
            Some("parameter active must be a boolean")
        );
    }

    #[actix_web::test]
    async fn test_handler_error_is_recorded_and_propagated() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/broken")
                    .wrap(Monitor::new(registry.clone(), "broken"))
                    .route(web::get().to(|| async {
                        Err::<HttpResponse, ApiError>(ApiError::NotFound("Client not found".into()))
                    })),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/broken").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let stat = registry.get("broken").unwrap();
        assert_eq!(stat.failed_calls, 1);
        assert_eq!(stat.last_error.as_deref(), Some("Client not found"));
    }

    #[actix_web::test]
    async fn test_server_error_status_counts_as_failure() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/broken")
                    .wrap(Monitor::new(registry.clone(), "broken"))
                    .route(web::get().to(|| async { HttpResponse::BadGateway().finish() })),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/broken").to_request();
        let _ = test::call_service(&app, req).await;

        let stat = registry.get("broken").unwrap();
        assert_eq!(stat.failed_calls, 1);
        assert_eq!(stat.status, RouteStatus::Unhealthy);
    }

    #[actix_web::test]
    async fn test_unconstrained_method_skips_validation() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::delete().to(|| async { HttpResponse::NoContent().finish() })),
            ),
        )
        .await;

        let req = test::TestRequest::delete().uri("/item").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(registry.get("get_item").unwrap().total_calls, 1);
    }

    #[actix_web::test]
    async fn test_poisoned_registry_fails_request_without_panicking() {
        let registry = registry();
        let app = test::init_service(
            App::new().service(
                web::resource("/item")
                    .wrap(Monitor::new(registry.clone(), "get_item"))
                    .route(web::get().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let routes = Arc::clone(&registry.routes);
        let _ = std::thread::spawn(move || {
            let _guard = routes.write().unwrap();
            panic!("route map poisoned for test");
        })
        .join();

        let req = test::TestRequest::get().uri("/item?id=7").to_request();
        let err = app.call(req).await.err().expect("poisoned registry should fail");
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(matches!(registry.get("get_item"), Err(RegistryError::Poisoned)));
    }
}
