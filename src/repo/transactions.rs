use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
};

use crate::{entities::transactions, state::DatabaseClient};

/// Optional narrowing applied on top of the caller's account scope.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
}

#[async_trait]
pub trait TransactionsRepo: Send + Sync {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: transactions::ActiveModel,
    ) -> Result<transactions::Model, sea_orm::DbErr>;
    /// Newest first; ties broken by id, newest first.
    async fn find_by_accounts(
        &self,
        account_ids: &[i32],
        filter: &TransactionFilter,
    ) -> Result<Vec<transactions::Model>, sea_orm::DbErr>;
    async fn delete_by_accounts_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_ids: &[i32],
    ) -> Result<u64, sea_orm::DbErr>;
}

pub struct SeaOrmTransactionsRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmTransactionsRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TransactionsRepo for SeaOrmTransactionsRepo {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: transactions::ActiveModel,
    ) -> Result<transactions::Model, sea_orm::DbErr> {
        model.insert(txn).await
    }

    async fn find_by_accounts(
        &self,
        account_ids: &[i32],
        filter: &TransactionFilter,
    ) -> Result<Vec<transactions::Model>, sea_orm::DbErr> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = transactions::Entity::find()
            .filter(transactions::Column::AccountId.is_in(account_ids.iter().copied()));
        if let Some(start_date) = filter.start_date {
            query = query.filter(transactions::Column::Date.gte(start_date));
        }
        if let Some(end_date) = filter.end_date {
            query = query.filter(transactions::Column::Date.lte(end_date));
        }
        if let Some(category) = &filter.category {
            query = query.filter(transactions::Column::Category.eq(category.as_str()));
        }

        query
            .order_by_desc(transactions::Column::Date)
            .order_by_desc(transactions::Column::Id)
            .all(self.db.conn())
            .await
    }

    async fn delete_by_accounts_with_txn(
        &self,
        txn: &DatabaseTransaction,
        account_ids: &[i32],
    ) -> Result<u64, sea_orm::DbErr> {
        if account_ids.is_empty() {
            return Ok(0);
        }
        let result = transactions::Entity::delete_many()
            .filter(transactions::Column::AccountId.is_in(account_ids.iter().copied()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}
