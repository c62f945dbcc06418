use crate::graphql::handlers::{self, GRAPHQL_PATH};
use actix_web::web;

/// Mounts `POST /graphql` and the playground at `GET /playground`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(GRAPHQL_PATH).route(web::post().to(handlers::graphql_handler)))
        .service(web::resource("/playground").route(web::get().to(handlers::graphql_playground)));
}
