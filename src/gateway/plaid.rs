//! Plaid implementation of the aggregation gateway.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{AccountData, AggregationGateway, ExchangedToken, GatewayError, TransactionData};
use crate::config::Config;

const PRODUCTS: [&str; 1] = ["transactions"];
const COUNTRY_CODES: [&str; 1] = ["US"];
const LANGUAGE: &str = "en";
const TRANSACTIONS_PAGE_SIZE: usize = 500;

pub struct PlaidGateway {
    client: reqwest::Client,
    base_url: String,
    client_id: Option<String>,
    secret: Option<String>,
    client_name: String,
}

#[derive(Serialize)]
struct LinkTokenUser<'a> {
    client_user_id: &'a str,
}

#[derive(Serialize)]
struct LinkTokenCreateRequest<'a> {
    client_name: &'a str,
    user: LinkTokenUser<'a>,
    products: &'a [&'a str],
    country_codes: &'a [&'a str],
    language: &'a str,
}

#[derive(Deserialize)]
struct LinkTokenCreateResponse {
    link_token: String,
}

#[derive(Serialize)]
struct PublicTokenExchangeRequest<'a> {
    public_token: &'a str,
}

#[derive(Deserialize)]
struct PublicTokenExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct ItemGetResponse {
    item: PlaidItem,
}

#[derive(Deserialize)]
struct PlaidItem {
    institution_id: Option<String>,
}

#[derive(Serialize)]
struct InstitutionGetByIdRequest<'a> {
    institution_id: &'a str,
    country_codes: &'a [&'a str],
}

#[derive(Deserialize)]
struct InstitutionGetByIdResponse {
    institution: PlaidInstitution,
}

#[derive(Deserialize)]
struct PlaidInstitution {
    name: String,
}

#[derive(Deserialize)]
struct AccountsGetResponse {
    accounts: Vec<PlaidAccount>,
}

#[derive(Deserialize)]
struct PlaidAccount {
    account_id: String,
    name: String,
    #[serde(rename = "type")]
    account_type: String,
    subtype: Option<String>,
    balances: PlaidBalances,
}

#[derive(Deserialize)]
struct PlaidBalances {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    current: Option<Decimal>,
}

#[derive(Serialize)]
struct TransactionsGetOptions {
    count: usize,
    offset: usize,
}

#[derive(Serialize)]
struct TransactionsGetRequest<'a> {
    access_token: &'a str,
    start_date: String,
    end_date: String,
    options: TransactionsGetOptions,
}

#[derive(Deserialize)]
struct TransactionsGetResponse {
    transactions: Vec<PlaidTransaction>,
    total_transactions: usize,
}

#[derive(Deserialize)]
struct PlaidTransaction {
    transaction_id: String,
    account_id: String,
    date: NaiveDate,
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    #[serde(default)]
    category: Option<Vec<String>>,
    #[serde(default)]
    pending: bool,
}

#[derive(Deserialize)]
struct PlaidErrorBody {
    error_code: Option<String>,
    error_message: Option<String>,
    display_message: Option<String>,
}

impl PlaidGateway {
    /// Builds the HTTP client once; every call shares its connection pool and timeout.
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.plaid_timeout_seconds));

        if config.plaid_danger_accept_invalid_certs {
            if cfg!(debug_assertions) {
                tracing::warn!(
                    base_url = %config.plaid_base_url,
                    "TLS certificate verification is DISABLED for provider calls; debug builds only"
                );
                builder = builder.danger_accept_invalid_certs(true);
            } else {
                tracing::warn!(
                    "PLAID_DANGER_ACCEPT_INVALID_CERTS is ignored in release builds"
                );
            }
        }

        let client = builder.build().map_err(GatewayError::Transport)?;
        if config.plaid_client_id.is_none() || config.plaid_secret.is_none() {
            tracing::warn!("PLAID_CLIENT_ID/PLAID_SECRET not set; link routes will fail");
        }

        Ok(Self {
            client,
            base_url: config.plaid_base_url.trim_end_matches('/').to_string(),
            client_id: config.plaid_client_id.clone(),
            secret: config.plaid_secret.clone(),
            client_name: config.plaid_client_name.clone(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or(GatewayError::NotConfigured("PLAID_CLIENT_ID"))?;
        let secret = self
            .secret
            .as_deref()
            .ok_or(GatewayError::NotConfigured("PLAID_SECRET"))?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("PLAID-CLIENT-ID", client_id)
            .header("PLAID-SECRET", secret)
            .json(body)
            .send()
            .await
            .map_err(GatewayError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &raw));
        }

        response
            .json::<R>()
            .await
            .map_err(|err| GatewayError::Decode(format!("{path}: {err}")))
    }
}

fn provider_error(status: u16, raw: &str) -> GatewayError {
    let body = serde_json::from_str::<PlaidErrorBody>(raw).ok();
    let code = body
        .as_ref()
        .and_then(|body| body.error_code.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let message = body
        .and_then(|body| body.error_message.or(body.display_message))
        .unwrap_or_else(|| format!("provider returned status {status}"));
    GatewayError::Provider {
        status,
        code,
        message,
    }
}

#[async_trait]
impl AggregationGateway for PlaidGateway {
    async fn create_link_token(&self, user_id: &str) -> Result<String, GatewayError> {
        let request = LinkTokenCreateRequest {
            client_name: &self.client_name,
            user: LinkTokenUser {
                client_user_id: user_id,
            },
            products: &PRODUCTS,
            country_codes: &COUNTRY_CODES,
            language: LANGUAGE,
        };
        let response: LinkTokenCreateResponse = self.post("/link/token/create", &request).await?;
        tracing::debug!(user_id, "link token created");
        Ok(response.link_token)
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<ExchangedToken, GatewayError> {
        let response: PublicTokenExchangeResponse = self
            .post(
                "/item/public_token/exchange",
                &PublicTokenExchangeRequest { public_token },
            )
            .await?;
        Ok(ExchangedToken {
            access_token: response.access_token,
            item_id: response.item_id,
        })
    }

    async fn institution_name(&self, access_token: &str) -> Result<String, GatewayError> {
        let item: ItemGetResponse = self
            .post("/item/get", &AccessTokenRequest { access_token })
            .await?;
        let institution_id = item
            .item
            .institution_id
            .ok_or_else(|| GatewayError::Decode("item has no institution_id".to_string()))?;

        let institution: InstitutionGetByIdResponse = self
            .post(
                "/institutions/get_by_id",
                &InstitutionGetByIdRequest {
                    institution_id: &institution_id,
                    country_codes: &COUNTRY_CODES,
                },
            )
            .await?;
        Ok(institution.institution.name)
    }

    async fn list_accounts(&self, access_token: &str) -> Result<Vec<AccountData>, GatewayError> {
        let response: AccountsGetResponse = self
            .post("/accounts/get", &AccessTokenRequest { access_token })
            .await?;
        Ok(response
            .accounts
            .into_iter()
            .map(|account| AccountData {
                account_id: account.account_id,
                name: account.name,
                account_type: account.account_type,
                subtype: account.subtype,
                current_balance: account.balances.current,
            })
            .collect())
    }

    async fn list_transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TransactionData>, GatewayError> {
        let mut collected = Vec::new();
        loop {
            let request = TransactionsGetRequest {
                access_token,
                start_date: start_date.format("%Y-%m-%d").to_string(),
                end_date: end_date.format("%Y-%m-%d").to_string(),
                options: TransactionsGetOptions {
                    count: TRANSACTIONS_PAGE_SIZE,
                    offset: collected.len(),
                },
            };
            let page: TransactionsGetResponse = self.post("/transactions/get", &request).await?;
            let received = page.transactions.len();
            collected.extend(page.transactions.into_iter().map(|txn| TransactionData {
                transaction_id: txn.transaction_id,
                account_id: txn.account_id,
                date: txn.date,
                name: txn.name,
                amount: txn.amount,
                category: txn.category,
                pending: txn.pending,
            }));
            if received == 0 || collected.len() >= page.total_transactions {
                break;
            }
        }
        tracing::debug!(count = collected.len(), %start_date, %end_date, "transactions fetched");
        Ok(collected)
    }
}
