use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    error::{ApiError, ErrorResponse},
    handler::extract::CurrentUser,
    repo::transactions::TransactionFilter,
    service::query::{TransactionQuery, TransactionView},
    state::AppState,
};

/// Raw query string values; blanks count as absent.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionParams {
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    pub account_id: Option<String>,
    /// Exact category match.
    pub category: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    present(value)
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|_| ApiError::validation(format!("{field} must be a date in YYYY-MM-DD format")))
        })
        .transpose()
}

impl TryFrom<TransactionParams> for TransactionQuery {
    type Error = ApiError;

    fn try_from(params: TransactionParams) -> Result<Self, Self::Error> {
        let account_id = present(params.account_id)
            .map(|value| {
                value
                    .parse::<i32>()
                    .map_err(|_| ApiError::validation("account_id must be an integer"))
            })
            .transpose()?;

        Ok(TransactionQuery {
            account_id,
            filter: TransactionFilter {
                start_date: parse_date("start_date", params.start_date)?,
                end_date: parse_date("end_date", params.end_date)?,
                category: present(params.category),
            },
        })
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/transactions", get(list_transactions))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(TransactionParams),
    responses(
        (status = 200, description = "Transactions, newest first", body = [TransactionView]),
        (status = 400, description = "Malformed filter", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "transactions"
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<TransactionParams>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let query = TransactionQuery::try_from(params)?;
    Ok(Json(state.query().list_transactions(user.id, query).await?))
}
