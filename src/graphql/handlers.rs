use actix_web::{HttpResponse, Responder, web};
use async_graphql::http::{GraphQLPlaygroundConfig, playground_source};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::graphql::schema::AppSchema;

/// Endpoint the playground sends queries to.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Executes a GraphQL request against the shared schema.
pub async fn graphql_handler(schema: web::Data<AppSchema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

/// Serves the GraphQL Playground, pointed at [`GRAPHQL_PATH`].
pub async fn graphql_playground() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(playground_source(GraphQLPlaygroundConfig::new(GRAPHQL_PATH)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::schema::create_schema;
    use crate::health::fake::FakeDb;
    use crate::monitor::RouteRegistry;
    use actix_web::http::{StatusCode, header::ContentType};
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_graphql_handler() {
        let (checker, _db) = FakeDb::with_admin_schema().into_checker();
        let schema = create_schema(Arc::new(checker), RouteRegistry::new());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(schema))
                .route(GRAPHQL_PATH, web::post().to(graphql_handler)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(GRAPHQL_PATH)
            .insert_header(ContentType::json())
            .set_json(json!({"query": "{ health { status } }"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["health"]["status"], "healthy");

        // Unknown fields still answer 200, with GraphQL errors in the body.
        let req = test::TestRequest::post()
            .uri(GRAPHQL_PATH)
            .insert_header(ContentType::json())
            .set_json(json!({"query": "{ invalid_field }"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert!(!body["errors"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_graphql_playground() {
        let app = test::init_service(
            App::new().route("/playground", web::get().to(graphql_playground)),
        )
        .await;

        let req = test::TestRequest::get().uri("/playground").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );

        let body = test::read_body(resp).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("GraphQL Playground"));
        assert!(body.contains(GRAPHQL_PATH));
    }
}
