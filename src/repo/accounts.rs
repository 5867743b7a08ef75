use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::{
    entities::{accounts, credentials},
    state::DatabaseClient,
};

#[async_trait]
pub trait AccountsRepo: Send + Sync {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: accounts::ActiveModel,
    ) -> Result<accounts::Model, sea_orm::DbErr>;
    /// Accounts whose credential belongs to `user_id`, paired with that credential.
    async fn find_by_user_with_credentials(
        &self,
        user_id: i32,
    ) -> Result<Vec<(accounts::Model, credentials::Model)>, sea_orm::DbErr>;
    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<accounts::Model>, sea_orm::DbErr>;
    async fn find_ids_by_credentials_with_txn(
        &self,
        txn: &DatabaseTransaction,
        credential_ids: &[i32],
    ) -> Result<Vec<i32>, sea_orm::DbErr>;
    async fn count_by_credential_with_txn(
        &self,
        txn: &DatabaseTransaction,
        credential_id: i32,
    ) -> Result<u64, sea_orm::DbErr>;
    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<u64, sea_orm::DbErr>;
    async fn delete_by_ids_with_txn(
        &self,
        txn: &DatabaseTransaction,
        ids: &[i32],
    ) -> Result<u64, sea_orm::DbErr>;
}

pub struct SeaOrmAccountsRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmAccountsRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountsRepo for SeaOrmAccountsRepo {
    async fn insert_with_txn(
        &self,
        txn: &DatabaseTransaction,
        model: accounts::ActiveModel,
    ) -> Result<accounts::Model, sea_orm::DbErr> {
        model.insert(txn).await
    }

    async fn find_by_user_with_credentials(
        &self,
        user_id: i32,
    ) -> Result<Vec<(accounts::Model, credentials::Model)>, sea_orm::DbErr> {
        let rows = accounts::Entity::find()
            .find_also_related(credentials::Entity)
            .filter(credentials::Column::UserId.eq(user_id))
            .order_by_asc(accounts::Column::Id)
            .all(self.db.conn())
            .await?;

        // The filter on the joined credential makes a missing parent impossible.
        Ok(rows
            .into_iter()
            .filter_map(|(account, credential)| credential.map(|credential| (account, credential)))
            .collect())
    }

    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<accounts::Model>, sea_orm::DbErr> {
        accounts::Entity::find_by_id(id).one(txn).await
    }

    async fn find_ids_by_credentials_with_txn(
        &self,
        txn: &DatabaseTransaction,
        credential_ids: &[i32],
    ) -> Result<Vec<i32>, sea_orm::DbErr> {
        if credential_ids.is_empty() {
            return Ok(Vec::new());
        }
        accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .filter(accounts::Column::CredentialId.is_in(credential_ids.iter().copied()))
            .into_tuple()
            .all(txn)
            .await
    }

    async fn count_by_credential_with_txn(
        &self,
        txn: &DatabaseTransaction,
        credential_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        accounts::Entity::find()
            .filter(accounts::Column::CredentialId.eq(credential_id))
            .count(txn)
            .await
    }

    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = accounts::Entity::delete_by_id(id).exec(txn).await?;
        Ok(result.rows_affected)
    }

    async fn delete_by_ids_with_txn(
        &self,
        txn: &DatabaseTransaction,
        ids: &[i32],
    ) -> Result<u64, sea_orm::DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = accounts::Entity::delete_many()
            .filter(accounts::Column::Id.is_in(ids.iter().copied()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}
