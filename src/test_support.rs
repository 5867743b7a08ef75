//! Shared fixtures for unit tests: an in-memory store and a scripted gateway.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    entities::{accounts, credentials, transactions, users},
    gateway::{AccountData, AggregationGateway, ExchangedToken, GatewayError, TransactionData},
    state::DatabaseClient,
};

pub async fn memory_conn() -> Result<DatabaseConnection, DbErr> {
    crate::db::connect("sqlite::memory:").await
}

pub struct TestDatabaseClient {
    conn: DatabaseConnection,
}

impl DatabaseClient for TestDatabaseClient {
    fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

pub async fn test_db() -> Arc<dyn DatabaseClient> {
    let conn = memory_conn().await.expect("sqlite connection");
    crate::schema::apply(&conn).await.expect("schema apply");
    Arc::new(TestDatabaseClient { conn })
}

pub async fn insert_user(db: &dyn DatabaseClient, username: &str) -> users::Model {
    users::ActiveModel {
        uid: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set("unused".to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db.conn())
    .await
    .expect("insert user")
}

pub async fn insert_credential(
    db: &dyn DatabaseClient,
    user_id: i32,
    institution_name: &str,
) -> credentials::Model {
    credentials::ActiveModel {
        user_id: Set(user_id),
        item_id: Set(format!("item-{}", Uuid::new_v4().simple())),
        access_token: Set(format!("access-sandbox-{}", Uuid::new_v4().simple())),
        institution_name: Set(institution_name.to_string()),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db.conn())
    .await
    .expect("insert credential")
}

pub async fn insert_account(
    db: &dyn DatabaseClient,
    credential_id: i32,
    name: &str,
) -> accounts::Model {
    accounts::ActiveModel {
        credential_id: Set(credential_id),
        provider_account_id: Set(format!("acc-{}", Uuid::new_v4().simple())),
        name: Set(name.to_string()),
        account_type: Set("depository".to_string()),
        subtype: Set(Some("checking".to_string())),
        current_balance: Set(Some(Decimal::new(10000, 2))),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db.conn())
    .await
    .expect("insert account")
}

pub async fn insert_transaction(
    db: &dyn DatabaseClient,
    account_id: i32,
    date: NaiveDate,
    category: &str,
) -> transactions::Model {
    transactions::ActiveModel {
        account_id: Set(account_id),
        transaction_id: Set(format!("txn-{}", Uuid::new_v4().simple())),
        date: Set(date),
        name: Set("Coffee".to_string()),
        amount: Set(Decimal::new(450, 2)),
        category: Set(category.to_string()),
        pending: Set(false),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db.conn())
    .await
    .expect("insert transaction")
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

/// Gateway double whose answers are fixed up front. Failing steps return a
/// provider error carrying the step name.
#[derive(Default)]
pub struct StubGateway {
    pub fail_exchange: bool,
    pub fail_institution: bool,
    pub fail_accounts: bool,
    pub fail_transactions: bool,
    pub institution_name: String,
    pub accounts: Vec<AccountData>,
    pub transactions: Vec<TransactionData>,
    pub transaction_windows: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            institution_name: "First Platypus Bank".to_string(),
            ..Default::default()
        }
    }

    fn failure(step: &str) -> GatewayError {
        GatewayError::Provider {
            status: 400,
            code: "INVALID_INPUT".to_string(),
            message: format!("{step} rejected"),
        }
    }
}

#[async_trait]
impl AggregationGateway for StubGateway {
    async fn create_link_token(&self, user_id: &str) -> Result<String, GatewayError> {
        Ok(format!("link-sandbox-{user_id}"))
    }

    async fn exchange_public_token(
        &self,
        public_token: &str,
    ) -> Result<ExchangedToken, GatewayError> {
        if self.fail_exchange {
            return Err(Self::failure("exchange"));
        }
        Ok(ExchangedToken {
            access_token: format!("access-{public_token}"),
            item_id: format!("item-{public_token}"),
        })
    }

    async fn institution_name(&self, _access_token: &str) -> Result<String, GatewayError> {
        if self.fail_institution {
            return Err(Self::failure("institution"));
        }
        Ok(self.institution_name.clone())
    }

    async fn list_accounts(&self, _access_token: &str) -> Result<Vec<AccountData>, GatewayError> {
        if self.fail_accounts {
            return Err(Self::failure("accounts"));
        }
        Ok(self.accounts.clone())
    }

    async fn list_transactions(
        &self,
        _access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TransactionData>, GatewayError> {
        self.transaction_windows
            .lock()
            .expect("window log")
            .push((start_date, end_date));
        if self.fail_transactions {
            return Err(Self::failure("transactions"));
        }
        Ok(self.transactions.clone())
    }
}

pub fn account_data(provider_account_id: &str, name: &str) -> AccountData {
    AccountData {
        account_id: provider_account_id.to_string(),
        name: name.to_string(),
        account_type: "depository".to_string(),
        subtype: Some("checking".to_string()),
        current_balance: Some(Decimal::new(123456, 2)),
    }
}

pub fn transaction_data(
    transaction_id: &str,
    provider_account_id: &str,
    category: Option<Vec<&str>>,
) -> TransactionData {
    TransactionData {
        transaction_id: transaction_id.to_string(),
        account_id: provider_account_id.to_string(),
        date: date("2026-10-01"),
        name: "Uber 063015 SF**POOL**".to_string(),
        amount: Decimal::new(-540, 2),
        category: category.map(|values| values.into_iter().map(str::to_string).collect()),
        pending: false,
    }
}
