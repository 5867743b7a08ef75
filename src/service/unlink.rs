//! Cascading removal of linked accounts. Every cascade runs in one store
//! transaction: transactions, then accounts, then credentials.

use async_trait::async_trait;
use sea_orm::TransactionTrait;
use std::sync::Arc;

use crate::{
    error::ApiError,
    repo::{
        accounts::AccountsRepo, credentials::CredentialsRepo, transactions::TransactionsRepo,
    },
    state::DatabaseClient,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlinkOutcome {
    AccountOnly,
    /// The account was the credential's last one, so the credential went too.
    AccountAndCredential,
}

impl UnlinkOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            UnlinkOutcome::AccountOnly => "Account unlinked successfully",
            UnlinkOutcome::AccountAndCredential => {
                "Account and institution connection unlinked successfully"
            }
        }
    }
}

#[async_trait]
pub trait UnlinkService: Send + Sync {
    async fn unlink_account(&self, user_id: i32, account_id: i32)
        -> Result<UnlinkOutcome, ApiError>;
    /// Returns the number of accounts removed.
    async fn unlink_all(&self, user_id: i32) -> Result<u64, ApiError>;
}

pub struct UnlinkServiceImpl {
    db: Arc<dyn DatabaseClient>,
    credentials_repo: Arc<dyn CredentialsRepo>,
    accounts_repo: Arc<dyn AccountsRepo>,
    transactions_repo: Arc<dyn TransactionsRepo>,
}

impl UnlinkServiceImpl {
    pub fn new(
        db: Arc<dyn DatabaseClient>,
        credentials_repo: Arc<dyn CredentialsRepo>,
        accounts_repo: Arc<dyn AccountsRepo>,
        transactions_repo: Arc<dyn TransactionsRepo>,
    ) -> Self {
        Self {
            db,
            credentials_repo,
            accounts_repo,
            transactions_repo,
        }
    }
}

#[async_trait]
impl UnlinkService for UnlinkServiceImpl {
    async fn unlink_account(
        &self,
        user_id: i32,
        account_id: i32,
    ) -> Result<UnlinkOutcome, ApiError> {
        let credentials_repo = self.credentials_repo.clone();
        let accounts_repo = self.accounts_repo.clone();
        let transactions_repo = self.transactions_repo.clone();

        let outcome = self
            .db
            .conn()
            .transaction::<_, UnlinkOutcome, ApiError>(move |txn| {
                Box::pin(async move {
                    let Some(account) = accounts_repo.find_by_id_with_txn(txn, account_id).await?
                    else {
                        return Err(ApiError::NotFound("Account not found".to_string()));
                    };
                    let Some(credential) = credentials_repo
                        .find_by_id_with_txn(txn, account.credential_id)
                        .await?
                    else {
                        return Err(ApiError::NotFound("Account not found".to_string()));
                    };
                    if credential.user_id != user_id {
                        return Err(ApiError::Forbidden(
                            "You do not have permission to unlink this account".to_string(),
                        ));
                    }

                    transactions_repo
                        .delete_by_accounts_with_txn(txn, &[account.id])
                        .await?;
                    accounts_repo.delete_by_id_with_txn(txn, account.id).await?;

                    let remaining = accounts_repo
                        .count_by_credential_with_txn(txn, credential.id)
                        .await?;
                    if remaining > 0 {
                        return Ok(UnlinkOutcome::AccountOnly);
                    }
                    credentials_repo
                        .delete_by_id_with_txn(txn, credential.id)
                        .await?;
                    Ok(UnlinkOutcome::AccountAndCredential)
                })
            })
            .await?;

        tracing::info!(user_id, account_id, ?outcome, "account unlinked");
        Ok(outcome)
    }

    async fn unlink_all(&self, user_id: i32) -> Result<u64, ApiError> {
        let credentials_repo = self.credentials_repo.clone();
        let accounts_repo = self.accounts_repo.clone();
        let transactions_repo = self.transactions_repo.clone();

        let removed = self
            .db
            .conn()
            .transaction::<_, u64, ApiError>(move |txn| {
                Box::pin(async move {
                    let credential_ids = credentials_repo
                        .find_ids_by_user_with_txn(txn, user_id)
                        .await?;
                    if credential_ids.is_empty() {
                        return Ok(0);
                    }
                    let account_ids = accounts_repo
                        .find_ids_by_credentials_with_txn(txn, &credential_ids)
                        .await?;

                    transactions_repo
                        .delete_by_accounts_with_txn(txn, &account_ids)
                        .await?;
                    accounts_repo.delete_by_ids_with_txn(txn, &account_ids).await?;
                    credentials_repo.delete_by_user_with_txn(txn, user_id).await?;
                    Ok(account_ids.len() as u64)
                })
            })
            .await?;

        tracing::info!(user_id, accounts_removed = removed, "all accounts unlinked");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        repo::{
            accounts::SeaOrmAccountsRepo,
            credentials::SeaOrmCredentialsRepo,
            transactions::{SeaOrmTransactionsRepo, TransactionFilter},
        },
        test_support::{self, date},
    };

    fn service(db: &Arc<dyn DatabaseClient>) -> UnlinkServiceImpl {
        UnlinkServiceImpl::new(
            db.clone(),
            Arc::new(SeaOrmCredentialsRepo::new(db.clone())),
            Arc::new(SeaOrmAccountsRepo::new(db.clone())),
            Arc::new(SeaOrmTransactionsRepo::new(db.clone())),
        )
    }

    async fn credential_count(db: &Arc<dyn DatabaseClient>, user_id: i32) -> usize {
        SeaOrmCredentialsRepo::new(db.clone())
            .find_by_user(user_id)
            .await
            .expect("credentials")
            .len()
    }

    async fn transaction_count(db: &Arc<dyn DatabaseClient>, account_ids: &[i32]) -> usize {
        SeaOrmTransactionsRepo::new(db.clone())
            .find_by_accounts(account_ids, &TransactionFilter::default())
            .await
            .expect("transactions")
            .len()
    }

    #[tokio::test]
    async fn sibling_unlink_keeps_the_credential() {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "frank").await;
        let credential = test_support::insert_credential(db.as_ref(), user.id, "Tartan Bank").await;
        let checking = test_support::insert_account(db.as_ref(), credential.id, "Checking").await;
        let savings = test_support::insert_account(db.as_ref(), credential.id, "Savings").await;
        test_support::insert_transaction(db.as_ref(), checking.id, date("2026-09-01"), "Food").await;
        test_support::insert_transaction(db.as_ref(), savings.id, date("2026-09-02"), "Food").await;

        let unlink = service(&db);
        let outcome = unlink.unlink_account(user.id, checking.id).await.expect("unlink");
        assert_eq!(outcome, UnlinkOutcome::AccountOnly);
        assert_eq!(credential_count(&db, user.id).await, 1);
        assert_eq!(transaction_count(&db, &[checking.id, savings.id]).await, 1);

        let outcome = unlink.unlink_account(user.id, savings.id).await.expect("unlink");
        assert_eq!(outcome, UnlinkOutcome::AccountAndCredential);
        assert_eq!(credential_count(&db, user.id).await, 0);
        assert_eq!(transaction_count(&db, &[checking.id, savings.id]).await, 0);
    }

    #[tokio::test]
    async fn missing_and_foreign_accounts_are_refused() {
        let db = test_support::test_db().await;
        let owner = test_support::insert_user(db.as_ref(), "grace").await;
        let intruder = test_support::insert_user(db.as_ref(), "heidi").await;
        let credential = test_support::insert_credential(db.as_ref(), owner.id, "Tartan Bank").await;
        let account = test_support::insert_account(db.as_ref(), credential.id, "Checking").await;

        let unlink = service(&db);
        assert!(matches!(
            unlink.unlink_account(owner.id, account.id + 100).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            unlink.unlink_account(intruder.id, account.id).await,
            Err(ApiError::Forbidden(_))
        ));
        assert_eq!(credential_count(&db, owner.id).await, 1);
    }

    #[tokio::test]
    async fn unlink_all_removes_every_account_of_the_user_only() {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "ivan").await;
        let other = test_support::insert_user(db.as_ref(), "judy").await;
        let first = test_support::insert_credential(db.as_ref(), user.id, "Tartan Bank").await;
        let second = test_support::insert_credential(db.as_ref(), user.id, "Houndstooth Bank").await;
        let kept = test_support::insert_credential(db.as_ref(), other.id, "Tartan Bank").await;
        let a = test_support::insert_account(db.as_ref(), first.id, "Checking").await;
        let b = test_support::insert_account(db.as_ref(), first.id, "Savings").await;
        let c = test_support::insert_account(db.as_ref(), second.id, "Card").await;
        let d = test_support::insert_account(db.as_ref(), kept.id, "Checking").await;
        for account_id in [a.id, b.id, c.id, d.id] {
            test_support::insert_transaction(db.as_ref(), account_id, date("2026-09-01"), "Food").await;
        }

        let removed = service(&db).unlink_all(user.id).await.expect("unlink all");
        assert_eq!(removed, 3);
        assert_eq!(credential_count(&db, user.id).await, 0);
        assert_eq!(credential_count(&db, other.id).await, 1);
        assert_eq!(transaction_count(&db, &[a.id, b.id, c.id]).await, 0);
        assert_eq!(transaction_count(&db, &[d.id]).await, 1);
    }

    #[tokio::test]
    async fn unlink_all_without_credentials_is_a_no_op() {
        let db = test_support::test_db().await;
        let user = test_support::insert_user(db.as_ref(), "kim").await;
        assert_eq!(service(&db).unlink_all(user.id).await.expect("unlink all"), 0);
    }
}
