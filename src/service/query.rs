use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    repo::{
        accounts::AccountsRepo,
        transactions::{TransactionFilter, TransactionsRepo},
    },
};

/// Rounds to cents and pins the scale so `100` serializes as `"100.00"`.
pub fn money(value: Decimal) -> Decimal {
    let mut value = value.round_dp(2);
    value.rescale(2);
    value
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct AccountView {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub subtype: Option<String>,
    #[schema(value_type = Option<String>, example = "1234.56")]
    pub current_balance: Option<Decimal>,
    pub institution_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: i32,
    pub transaction_id: String,
    pub date: NaiveDate,
    pub name: String,
    #[schema(value_type = String, example = "-5.40")]
    pub amount: Decimal,
    pub category: String,
    pub pending: bool,
    pub account_name: String,
    pub institution_name: String,
}

#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub account_id: Option<i32>,
    pub filter: TransactionFilter,
}

#[async_trait]
pub trait QueryService: Send + Sync {
    async fn list_accounts(&self, user_id: i32) -> Result<Vec<AccountView>, ApiError>;
    /// An `account_id` the user does not own yields an empty list.
    async fn list_transactions(
        &self,
        user_id: i32,
        query: TransactionQuery,
    ) -> Result<Vec<TransactionView>, ApiError>;
}

pub struct QueryServiceImpl {
    accounts_repo: Arc<dyn AccountsRepo>,
    transactions_repo: Arc<dyn TransactionsRepo>,
}

impl QueryServiceImpl {
    pub fn new(
        accounts_repo: Arc<dyn AccountsRepo>,
        transactions_repo: Arc<dyn TransactionsRepo>,
    ) -> Self {
        Self {
            accounts_repo,
            transactions_repo,
        }
    }
}

#[async_trait]
impl QueryService for QueryServiceImpl {
    async fn list_accounts(&self, user_id: i32) -> Result<Vec<AccountView>, ApiError> {
        let rows = self.accounts_repo.find_by_user_with_credentials(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|(account, credential)| AccountView {
                id: account.id,
                name: account.name,
                account_type: account.account_type,
                subtype: account.subtype,
                current_balance: account.current_balance.map(money),
                institution_name: credential.institution_name,
            })
            .collect())
    }

    async fn list_transactions(
        &self,
        user_id: i32,
        query: TransactionQuery,
    ) -> Result<Vec<TransactionView>, ApiError> {
        let owned: HashMap<i32, (String, String)> = self
            .accounts_repo
            .find_by_user_with_credentials(user_id)
            .await?
            .into_iter()
            .map(|(account, credential)| {
                (account.id, (account.name, credential.institution_name))
            })
            .collect();

        let scope: Vec<i32> = match query.account_id {
            Some(account_id) if owned.contains_key(&account_id) => vec![account_id],
            Some(_) => return Ok(Vec::new()),
            None => owned.keys().copied().collect(),
        };

        let rows = self
            .transactions_repo
            .find_by_accounts(&scope, &query.filter)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|transaction| {
                let (account_name, institution_name) = owned.get(&transaction.account_id)?.clone();
                Some(TransactionView {
                    id: transaction.id,
                    transaction_id: transaction.transaction_id,
                    date: transaction.date,
                    name: transaction.name,
                    amount: money(transaction.amount),
                    category: transaction.category,
                    pending: transaction.pending,
                    account_name,
                    institution_name,
                })
            })
            .collect())
    }
}
