//! Username/password registration and the token grant endpoints.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ErrorResponse},
    handler::{extract::JsonBody, profile::UserResponse},
    service::{auth::RegisterInput, token::TokenPair},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: pair.access,
            refresh: pair.refresh,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub tokens: TokenPairResponse,
}

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Serialize, ToSchema)]
pub struct AccessResponse {
    pub access: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/register", post(register))
        .route("/api/v1/token", post(token))
        .route("/api/v1/token/refresh", post(refresh))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Created", body = RegisterResponse),
        (status = 400, description = "Field errors keyed by field name")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let output = state
        .auth()
        .register(RegisterInput {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            password2: payload.password2,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: output.user.into(),
            tokens: output.tokens.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenPairResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn token(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<TokenRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let pair = state
        .auth()
        .login(&payload.username, &payload.password)
        .await?;
    Ok(Json(pair.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessResponse),
        (status = 401, description = "Refresh token invalid or expired", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<Json<AccessResponse>, ApiError> {
    let access = state.auth().refresh(&payload.refresh).await?;
    Ok(Json(AccessResponse { access }))
}
