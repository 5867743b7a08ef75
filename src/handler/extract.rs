use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;

use crate::{entities::users, error::ApiError, state::AppState};

/// `Json` whose rejections answer 400 `validation_error`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// The user behind the request's `Authorization: Bearer` access token.
pub struct CurrentUser(pub users::Model);

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = match header {
            Some(value) => Some(bearer_token(value).ok_or_else(|| {
                ApiError::Auth("Authorization header must contain a Bearer token".to_string())
            })?),
            None => None,
        };

        state.auth().authenticate(token).await.map(CurrentUser)
    }
}
