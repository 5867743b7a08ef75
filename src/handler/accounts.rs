use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorResponse},
    handler::extract::CurrentUser,
    service::query::AccountView,
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct UnlinkResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct UnlinkAllResponse {
    pub status: &'static str,
    pub message: String,
    pub accounts_removed: u64,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/accounts", get(list_accounts))
        .route("/api/v1/accounts/unlink-all", delete(unlink_all))
        .route("/api/v1/accounts/:id/unlink", delete(unlink_account))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "Linked accounts", body = [AccountView]),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    Ok(Json(state.query().list_accounts(user.id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}/unlink",
    params(
        ("id" = i32, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Unlinked", body = UnlinkResponse),
        (status = 403, description = "Account belongs to another user", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
pub async fn unlink_account(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UnlinkResponse>, ApiError> {
    let account_id = id
        .parse::<i32>()
        .map_err(|_| ApiError::NotFound("Account not found".to_string()))?;
    let outcome = state.unlink().unlink_account(user.id, account_id).await?;
    Ok(Json(UnlinkResponse {
        status: "success",
        message: outcome.message().to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/accounts/unlink-all",
    responses(
        (status = 200, description = "Every linked account removed", body = UnlinkAllResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "accounts"
)]
pub async fn unlink_all(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UnlinkAllResponse>, ApiError> {
    let removed = state.unlink().unlink_all(user.id).await?;
    let message = if removed == 0 {
        "No linked accounts to unlink".to_string()
    } else {
        format!("Unlinked {removed} account(s)")
    };
    Ok(Json(UnlinkAllResponse {
        status: "success",
        message,
        accounts_removed: removed,
    }))
}
