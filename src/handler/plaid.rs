use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorResponse},
    handler::extract::{CurrentUser, JsonBody},
    service::linking::LinkCompleteness,
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct LinkTokenResponse {
    pub link_token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ExchangeTokenRequest {
    #[serde(default)]
    pub public_token: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ExchangeTokenResponse {
    pub success: bool,
    pub institution_name: String,
    pub status: LinkCompleteness,
    pub accounts_linked: usize,
    pub transactions_imported: usize,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/link-token", get(link_token))
        .route("/api/v1/exchange-token", post(exchange_token))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/link-token",
    responses(
        (status = 200, description = "Token for the provider's link UI", body = LinkTokenResponse),
        (status = 400, description = "Provider rejected the request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "linking"
)]
pub async fn link_token(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<LinkTokenResponse>, ApiError> {
    let link_token = state.linking().create_link_token(&user).await?;
    Ok(Json(LinkTokenResponse { link_token }))
}

#[utoipa::path(
    post,
    path = "/api/v1/exchange-token",
    request_body = ExchangeTokenRequest,
    responses(
        (status = 200, description = "Institution linked", body = ExchangeTokenResponse),
        (status = 400, description = "Missing token or provider rejection", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "linking"
)]
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ExchangeTokenRequest>,
) -> Result<Json<ExchangeTokenResponse>, ApiError> {
    let outcome = state
        .linking()
        .link(&user, payload.public_token.as_deref())
        .await?;

    Ok(Json(ExchangeTokenResponse {
        success: true,
        institution_name: outcome.institution_name,
        status: outcome.completeness,
        accounts_linked: outcome.accounts_linked,
        transactions_imported: outcome.transactions_imported,
    }))
}
