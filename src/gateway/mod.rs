//! Aggregation provider port.
//!
//! The linking flow talks to the provider only through [`AggregationGateway`],
//! so tests can script provider behaviour without a network.

pub mod plaid;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider answered with a non-2xx status.
    #[error("{message}")]
    Provider {
        status: u16,
        code: String,
        message: String,
    },
    #[error("provider request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("provider is not configured: {0} is not set")]
    NotConfigured(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExchangedToken {
    pub access_token: String,
    pub item_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccountData {
    pub account_id: String,
    pub name: String,
    pub account_type: String,
    pub subtype: Option<String>,
    pub current_balance: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransactionData {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
    pub category: Option<Vec<String>>,
    pub pending: bool,
}

#[async_trait]
pub trait AggregationGateway: Send + Sync {
    /// Short-lived token the client uses to open the provider's link UI.
    async fn create_link_token(&self, user_id: &str) -> Result<String, GatewayError>;
    async fn exchange_public_token(&self, public_token: &str)
        -> Result<ExchangedToken, GatewayError>;
    async fn institution_name(&self, access_token: &str) -> Result<String, GatewayError>;
    async fn list_accounts(&self, access_token: &str) -> Result<Vec<AccountData>, GatewayError>;
    /// Both bounds are inclusive.
    async fn list_transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TransactionData>, GatewayError>;
}
