pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod logging;
pub mod openapi;
pub mod repo;
pub mod schema;
pub mod service;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{openapi::ApiDoc, state::AppState};

/// The full HTTP surface, Swagger UI included.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(handler::health::routes(state.clone()))
        .merge(handler::auth::password::routes(state.clone()))
        .merge(handler::profile::routes(state.clone()))
        .merge(handler::plaid::routes(state.clone()))
        .merge(handler::accounts::routes(state.clone()))
        .merge(handler::transactions::routes(state))
}
