pub mod config;
pub mod error;
pub mod graphql;
pub mod health;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod openapi;
pub mod routes;
pub mod store;
pub mod validation;
