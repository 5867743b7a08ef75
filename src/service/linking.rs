//! Account linking: exchange the provider's public token for a durable
//! credential, then pull accounts and a trailing window of transactions.
//!
//! Only the token exchange and the credential insert are fatal. Later steps,
//! provider calls and their store writes alike, are best-effort and their
//! failures are reported on the [`LinkOutcome`] instead of aborting. Each
//! batch is written in its own store transaction, so a failed batch leaves no
//! partial rows behind.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use utoipa::ToSchema;

use crate::{
    entities::{accounts, credentials, transactions, users},
    error::ApiError,
    gateway::{AccountData, AggregationGateway, TransactionData},
    repo::{
        accounts::AccountsRepo, credentials::CredentialsRepo, transactions::TransactionsRepo,
    },
    service::query::money,
    state::DatabaseClient,
};

pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const UNKNOWN_INSTITUTION: &str = "Unknown institution";

/// How far the link got past the credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkCompleteness {
    CredentialOnly,
    CredentialAndAccounts,
    Full,
}

#[derive(Debug)]
pub struct LinkOutcome {
    pub credential: credentials::Model,
    pub institution_name: String,
    pub completeness: LinkCompleteness,
    pub accounts_linked: usize,
    pub transactions_imported: usize,
    pub warnings: Vec<String>,
}

/// First provider category, or the default bucket.
pub fn category_for(categories: Option<&[String]>) -> String {
    categories
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

#[async_trait]
pub trait LinkingService: Send + Sync {
    async fn create_link_token(&self, user: &users::Model) -> Result<String, ApiError>;
    async fn link(
        &self,
        user: &users::Model,
        public_token: Option<&str>,
    ) -> Result<LinkOutcome, ApiError>;
}

pub struct LinkingServiceImpl {
    db: Arc<dyn DatabaseClient>,
    gateway: Arc<dyn AggregationGateway>,
    credentials_repo: Arc<dyn CredentialsRepo>,
    accounts_repo: Arc<dyn AccountsRepo>,
    transactions_repo: Arc<dyn TransactionsRepo>,
    window_days: u32,
}

impl LinkingServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        gateway: Arc<dyn AggregationGateway>,
        credentials_repo: Arc<dyn CredentialsRepo>,
        accounts_repo: Arc<dyn AccountsRepo>,
        transactions_repo: Arc<dyn TransactionsRepo>,
        window_days: u32,
    ) -> Self {
        Self {
            db,
            gateway,
            credentials_repo,
            accounts_repo,
            transactions_repo,
            window_days,
        }
    }

    pub(crate) async fn link_on(
        &self,
        user: &users::Model,
        public_token: Option<&str>,
        today: NaiveDate,
    ) -> Result<LinkOutcome, ApiError> {
        let Some(public_token) = public_token.map(str::trim).filter(|token| !token.is_empty())
        else {
            return Err(ApiError::validation("Missing public_token"));
        };

        let exchanged = self
            .gateway
            .exchange_public_token(public_token)
            .await
            .map_err(|err| {
                tracing::warn!(user_id = user.id, error = %err, "public token exchange failed");
                ApiError::from(err)
            })?;

        let mut warnings = Vec::new();
        let institution_name = match self.gateway.institution_name(&exchanged.access_token).await
        {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!(user_id = user.id, error = %err, "institution lookup failed");
                warnings.push(format!("institution lookup failed: {err}"));
                UNKNOWN_INSTITUTION.to_string()
            }
        };

        let credential = self
            .credentials_repo
            .insert(credentials::ActiveModel {
                user_id: Set(user.id),
                item_id: Set(exchanged.item_id),
                access_token: Set(exchanged.access_token),
                institution_name: Set(institution_name.clone()),
                created_at: Set(Utc::now().into()),
                ..Default::default()
            })
            .await?;
        tracing::info!(
            user_id = user.id,
            credential_id = credential.id,
            institution = %institution_name,
            "credential stored"
        );

        let mut outcome = LinkOutcome {
            credential,
            institution_name,
            completeness: LinkCompleteness::CredentialOnly,
            accounts_linked: 0,
            transactions_imported: 0,
            warnings,
        };

        let account_data = match self
            .gateway
            .list_accounts(&outcome.credential.access_token)
            .await
        {
            Ok(accounts) => accounts,
            Err(err) => {
                tracing::warn!(
                    credential_id = outcome.credential.id,
                    error = %err,
                    "account fetch failed; keeping credential without accounts"
                );
                outcome.warnings.push(format!("account fetch failed: {err}"));
                return Ok(outcome);
            }
        };
        let linked = match self
            .persist_accounts(outcome.credential.id, account_data)
            .await
        {
            Ok(linked) => linked,
            Err(err) => {
                tracing::error!(
                    credential_id = outcome.credential.id,
                    error = %err,
                    "storing accounts failed; keeping credential without accounts"
                );
                outcome.warnings.push("storing accounts failed".to_string());
                return Ok(outcome);
            }
        };
        outcome.accounts_linked = linked.len();
        outcome.completeness = LinkCompleteness::CredentialAndAccounts;

        let start_date = today - Duration::days(i64::from(self.window_days));
        let transaction_data = match self
            .gateway
            .list_transactions(&outcome.credential.access_token, start_date, today)
            .await
        {
            Ok(transactions) => transactions,
            Err(err) => {
                tracing::warn!(
                    credential_id = outcome.credential.id,
                    error = %err,
                    "transaction fetch failed; keeping accounts without transactions"
                );
                outcome
                    .warnings
                    .push(format!("transaction fetch failed: {err}"));
                return Ok(outcome);
            }
        };
        outcome.transactions_imported = match self
            .persist_transactions(&linked, transaction_data)
            .await
        {
            Ok(imported) => imported,
            Err(err) => {
                tracing::error!(
                    credential_id = outcome.credential.id,
                    error = %err,
                    "storing transactions failed; keeping accounts without transactions"
                );
                outcome
                    .warnings
                    .push("storing transactions failed".to_string());
                return Ok(outcome);
            }
        };
        outcome.completeness = LinkCompleteness::Full;

        tracing::info!(
            credential_id = outcome.credential.id,
            accounts = outcome.accounts_linked,
            transactions = outcome.transactions_imported,
            "link complete"
        );
        Ok(outcome)
    }

    async fn persist_accounts(
        &self,
        credential_id: i32,
        data: Vec<AccountData>,
    ) -> Result<Vec<accounts::Model>, ApiError> {
        let accounts_repo = self.accounts_repo.clone();
        let linked = self
            .db
            .conn()
            .transaction::<_, Vec<accounts::Model>, ApiError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut linked = Vec::with_capacity(data.len());
                    for account in data {
                        let model = accounts::ActiveModel {
                            credential_id: Set(credential_id),
                            provider_account_id: Set(account.account_id),
                            name: Set(account.name),
                            account_type: Set(account.account_type),
                            subtype: Set(account.subtype),
                            current_balance: Set(account.current_balance.map(money)),
                            created_at: Set(now.into()),
                            ..Default::default()
                        };
                        linked.push(accounts_repo.insert_with_txn(txn, model).await?);
                    }
                    Ok(linked)
                })
            })
            .await?;
        Ok(linked)
    }

    async fn persist_transactions(
        &self,
        linked: &[accounts::Model],
        data: Vec<TransactionData>,
    ) -> Result<usize, ApiError> {
        let account_ids: HashMap<String, i32> = linked
            .iter()
            .map(|account| (account.provider_account_id.clone(), account.id))
            .collect();
        let (matched, skipped): (Vec<_>, Vec<_>) = data
            .into_iter()
            .partition(|transaction| account_ids.contains_key(&transaction.account_id));
        if !skipped.is_empty() {
            tracing::debug!(
                skipped = skipped.len(),
                "skipping transactions for accounts not linked in this session"
            );
        }

        let transactions_repo = self.transactions_repo.clone();
        let imported = self
            .db
            .conn()
            .transaction::<_, usize, ApiError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut imported = 0;
                    for transaction in matched {
                        let Some(account_id) = account_ids.get(&transaction.account_id).copied()
                        else {
                            continue;
                        };
                        let model = transactions::ActiveModel {
                            account_id: Set(account_id),
                            category: Set(category_for(transaction.category.as_deref())),
                            transaction_id: Set(transaction.transaction_id),
                            date: Set(transaction.date),
                            name: Set(transaction.name),
                            amount: Set(money(transaction.amount)),
                            pending: Set(transaction.pending),
                            created_at: Set(now.into()),
                            ..Default::default()
                        };
                        transactions_repo.insert_with_txn(txn, model).await?;
                        imported += 1;
                    }
                    Ok(imported)
                })
            })
            .await?;
        Ok(imported)
    }
}

#[async_trait]
impl LinkingService for LinkingServiceImpl {
    async fn create_link_token(&self, user: &users::Model) -> Result<String, ApiError> {
        let token = self
            .gateway
            .create_link_token(&user.id.to_string())
            .await
            .map_err(|err| {
                tracing::warn!(user_id = user.id, error = %err, "link token creation failed");
                ApiError::from(err)
            })?;
        Ok(token)
    }

    async fn link(
        &self,
        user: &users::Model,
        public_token: Option<&str>,
    ) -> Result<LinkOutcome, ApiError> {
        self.link_on(user, public_token, Utc::now().date_naive()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repo::{
            accounts::SeaOrmAccountsRepo, credentials::SeaOrmCredentialsRepo,
            transactions::{SeaOrmTransactionsRepo, TransactionFilter},
        },
        test_support::{self, account_data, date, transaction_data, StubGateway},
    };
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseTransaction, DbErr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        db: Arc<dyn DatabaseClient>,
        gateway: Arc<StubGateway>,
        linking: LinkingServiceImpl,
        user: users::Model,
    }

    /// Lets the first `allowed` inserts through, then fails like a full disk.
    struct FlakyAccountsRepo {
        inner: SeaOrmAccountsRepo,
        allowed: usize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl AccountsRepo for FlakyAccountsRepo {
        async fn insert_with_txn(
            &self,
            txn: &DatabaseTransaction,
            model: accounts::ActiveModel,
        ) -> Result<accounts::Model, DbErr> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(DbErr::Custom("database or disk is full".to_string()));
            }
            self.inner.insert_with_txn(txn, model).await
        }

        async fn find_by_user_with_credentials(
            &self,
            user_id: i32,
        ) -> Result<Vec<(accounts::Model, credentials::Model)>, DbErr> {
            self.inner.find_by_user_with_credentials(user_id).await
        }

        async fn find_by_id_with_txn(
            &self,
            txn: &DatabaseTransaction,
            id: i32,
        ) -> Result<Option<accounts::Model>, DbErr> {
            self.inner.find_by_id_with_txn(txn, id).await
        }

        async fn find_ids_by_credentials_with_txn(
            &self,
            txn: &DatabaseTransaction,
            credential_ids: &[i32],
        ) -> Result<Vec<i32>, DbErr> {
            self.inner
                .find_ids_by_credentials_with_txn(txn, credential_ids)
                .await
        }

        async fn count_by_credential_with_txn(
            &self,
            txn: &DatabaseTransaction,
            credential_id: i32,
        ) -> Result<u64, DbErr> {
            self.inner.count_by_credential_with_txn(txn, credential_id).await
        }

        async fn delete_by_id_with_txn(
            &self,
            txn: &DatabaseTransaction,
            id: i32,
        ) -> Result<u64, DbErr> {
            self.inner.delete_by_id_with_txn(txn, id).await
        }

        async fn delete_by_ids_with_txn(
            &self,
            txn: &DatabaseTransaction,
            ids: &[i32],
        ) -> Result<u64, DbErr> {
            self.inner.delete_by_ids_with_txn(txn, ids).await
        }
    }

    struct FlakyTransactionsRepo {
        inner: SeaOrmTransactionsRepo,
        allowed: usize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl TransactionsRepo for FlakyTransactionsRepo {
        async fn insert_with_txn(
            &self,
            txn: &DatabaseTransaction,
            model: transactions::ActiveModel,
        ) -> Result<transactions::Model, DbErr> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(DbErr::Custom("database or disk is full".to_string()));
            }
            self.inner.insert_with_txn(txn, model).await
        }

        async fn find_by_accounts(
            &self,
            account_ids: &[i32],
            filter: &TransactionFilter,
        ) -> Result<Vec<transactions::Model>, DbErr> {
            self.inner.find_by_accounts(account_ids, filter).await
        }

        async fn delete_by_accounts_with_txn(
            &self,
            txn: &DatabaseTransaction,
            account_ids: &[i32],
        ) -> Result<u64, DbErr> {
            self.inner.delete_by_accounts_with_txn(txn, account_ids).await
        }
    }

    async fn fixture(gateway: StubGateway) -> Fixture {
        fixture_with(gateway, None, None).await
    }

    /// `None` keeps the real repository; `Some(n)` fails every insert after the first `n`.
    async fn fixture_with(
        gateway: StubGateway,
        account_inserts_allowed: Option<usize>,
        transaction_inserts_allowed: Option<usize>,
    ) -> Fixture {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "linker").await;
        let gateway = Arc::new(gateway);
        let accounts_repo: Arc<dyn AccountsRepo> = match account_inserts_allowed {
            Some(allowed) => Arc::new(FlakyAccountsRepo {
                inner: SeaOrmAccountsRepo::new(db.clone()),
                allowed,
                inserts: AtomicUsize::new(0),
            }),
            None => Arc::new(SeaOrmAccountsRepo::new(db.clone())),
        };
        let transactions_repo: Arc<dyn TransactionsRepo> = match transaction_inserts_allowed {
            Some(allowed) => Arc::new(FlakyTransactionsRepo {
                inner: SeaOrmTransactionsRepo::new(db.clone()),
                allowed,
                inserts: AtomicUsize::new(0),
            }),
            None => Arc::new(SeaOrmTransactionsRepo::new(db.clone())),
        };
        let linking = LinkingServiceImpl::new(
            db.clone(),
            gateway.clone(),
            Arc::new(SeaOrmCredentialsRepo::new(db.clone())),
            accounts_repo,
            transactions_repo,
            30,
        );
        Fixture {
            db,
            gateway,
            linking,
            user,
        }
    }

    fn scripted() -> StubGateway {
        StubGateway {
            accounts: vec![
                account_data("acc-1", "Plaid Checking"),
                account_data("acc-2", "Plaid Saving"),
            ],
            transactions: vec![
                transaction_data("txn-1", "acc-1", Some(vec!["Travel", "Taxi"])),
                transaction_data("txn-2", "acc-2", None),
                transaction_data("txn-3", "acc-unknown", Some(vec!["Food"])),
            ],
            ..StubGateway::new()
        }
    }

    async fn stored_credentials(fixture: &Fixture) -> Vec<credentials::Model> {
        SeaOrmCredentialsRepo::new(fixture.db.clone())
            .find_by_user(fixture.user.id)
            .await
            .expect("credentials")
    }

    #[test]
    fn category_defaults_only_when_provider_gives_none() {
        let empty: Vec<String> = Vec::new();
        let provided = vec!["Travel".to_string(), "Taxi".to_string()];
        assert_eq!(category_for(None), DEFAULT_CATEGORY);
        assert_eq!(category_for(Some(empty.as_slice())), DEFAULT_CATEGORY);
        assert_eq!(category_for(Some(provided.as_slice())), "Travel");

        let padded = vec!["  Travel ".to_string()];
        let blank_first = vec![String::new(), "Food".to_string()];
        assert_eq!(category_for(Some(padded.as_slice())), "  Travel ");
        assert_eq!(category_for(Some(blank_first.as_slice())), "");
    }

    #[tokio::test]
    async fn full_link_persists_everything_that_matches() {
        let fixture = fixture(scripted()).await;
        let outcome = fixture
            .linking
            .link_on(&fixture.user, Some("public-sandbox-1"), date("2026-10-18"))
            .await
            .expect("link");

        assert_eq!(outcome.completeness, LinkCompleteness::Full);
        assert_eq!(outcome.institution_name, "First Platypus Bank");
        assert_eq!(outcome.accounts_linked, 2);
        assert_eq!(outcome.transactions_imported, 2);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.credential.access_token, "access-public-sandbox-1");
        assert_eq!(outcome.credential.item_id, "item-public-sandbox-1");

        let windows = fixture.gateway.transaction_windows.lock().expect("windows").clone();
        assert_eq!(windows, vec![(date("2026-09-18"), date("2026-10-18"))]);

        let rows = SeaOrmAccountsRepo::new(fixture.db.clone())
            .find_by_user_with_credentials(fixture.user.id)
            .await
            .expect("accounts");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].0.current_balance.map(money),
            Some(Decimal::new(123456, 2))
        );

        let ids: Vec<i32> = rows.iter().map(|(account, _)| account.id).collect();
        let stored = SeaOrmTransactionsRepo::new(fixture.db.clone())
            .find_by_accounts(&ids, &TransactionFilter::default())
            .await
            .expect("transactions");
        let mut categories: Vec<&str> = stored.iter().map(|t| t.category.as_str()).collect();
        categories.sort();
        assert_eq!(categories, vec!["Travel", DEFAULT_CATEGORY]);
    }

    #[tokio::test]
    async fn blank_public_token_writes_nothing() {
        let fixture = fixture(scripted()).await;
        for token in [None, Some(""), Some("   ")] {
            let err = fixture
                .linking
                .link(&fixture.user, token)
                .await
                .expect_err("blank token");
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert!(stored_credentials(&fixture).await.is_empty());
    }

    #[tokio::test]
    async fn failed_exchange_writes_nothing() {
        let fixture = fixture(StubGateway {
            fail_exchange: true,
            ..scripted()
        })
        .await;
        let err = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect_err("exchange fails");
        assert!(matches!(err, ApiError::Provider(_)));
        assert!(stored_credentials(&fixture).await.is_empty());
    }

    #[tokio::test]
    async fn institution_lookup_failure_falls_back() {
        let fixture = fixture(StubGateway {
            fail_institution: true,
            ..scripted()
        })
        .await;
        let outcome = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect("link");
        assert_eq!(outcome.institution_name, UNKNOWN_INSTITUTION);
        assert_eq!(outcome.completeness, LinkCompleteness::Full);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn account_failure_keeps_a_bare_credential() {
        let fixture = fixture(StubGateway {
            fail_accounts: true,
            ..scripted()
        })
        .await;
        let outcome = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect("link");

        assert_eq!(outcome.completeness, LinkCompleteness::CredentialOnly);
        assert_eq!(outcome.accounts_linked, 0);
        assert_eq!(stored_credentials(&fixture).await.len(), 1);
        assert!(fixture
            .gateway
            .transaction_windows
            .lock()
            .expect("windows")
            .is_empty());
        let rows = SeaOrmAccountsRepo::new(fixture.db.clone())
            .find_by_user_with_credentials(fixture.user.id)
            .await
            .expect("accounts");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn transaction_failure_keeps_accounts() {
        let fixture = fixture(StubGateway {
            fail_transactions: true,
            ..scripted()
        })
        .await;
        let outcome = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect("link");

        assert_eq!(outcome.completeness, LinkCompleteness::CredentialAndAccounts);
        assert_eq!(outcome.accounts_linked, 2);
        assert_eq!(outcome.transactions_imported, 0);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn account_store_failure_rolls_back_and_keeps_the_credential() {
        let fixture = fixture_with(scripted(), Some(1), None).await;
        let outcome = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect("store failure is not fatal");

        assert_eq!(outcome.completeness, LinkCompleteness::CredentialOnly);
        assert_eq!(outcome.accounts_linked, 0);
        assert_eq!(outcome.warnings, vec!["storing accounts failed".to_string()]);
        assert_eq!(stored_credentials(&fixture).await.len(), 1);
        assert!(fixture
            .gateway
            .transaction_windows
            .lock()
            .expect("windows")
            .is_empty());

        let rows = SeaOrmAccountsRepo::new(fixture.db.clone())
            .find_by_user_with_credentials(fixture.user.id)
            .await
            .expect("accounts");
        assert!(rows.is_empty(), "first account insert must be rolled back");
    }

    #[tokio::test]
    async fn transaction_store_failure_keeps_accounts_without_transactions() {
        let fixture = fixture_with(scripted(), None, Some(1)).await;
        let outcome = fixture
            .linking
            .link(&fixture.user, Some("public-sandbox-1"))
            .await
            .expect("store failure is not fatal");

        assert_eq!(outcome.completeness, LinkCompleteness::CredentialAndAccounts);
        assert_eq!(outcome.accounts_linked, 2);
        assert_eq!(outcome.transactions_imported, 0);
        assert_eq!(
            outcome.warnings,
            vec!["storing transactions failed".to_string()]
        );

        let rows = SeaOrmAccountsRepo::new(fixture.db.clone())
            .find_by_user_with_credentials(fixture.user.id)
            .await
            .expect("accounts");
        let ids: Vec<i32> = rows.iter().map(|(account, _)| account.id).collect();
        assert_eq!(ids.len(), 2);
        let stored = SeaOrmTransactionsRepo::new(fixture.db.clone())
            .find_by_accounts(&ids, &TransactionFilter::default())
            .await
            .expect("transactions");
        assert!(stored.is_empty(), "first transaction insert must be rolled back");
    }
}
