use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect,
};

use crate::{entities::credentials, state::DatabaseClient};

#[async_trait]
pub trait CredentialsRepo: Send + Sync {
    async fn insert(
        &self,
        model: credentials::ActiveModel,
    ) -> Result<credentials::Model, sea_orm::DbErr>;
    async fn find_by_user(&self, user_id: i32) -> Result<Vec<credentials::Model>, sea_orm::DbErr>;
    async fn find_ids_by_user_with_txn(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
    ) -> Result<Vec<i32>, sea_orm::DbErr>;
    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<credentials::Model>, sea_orm::DbErr>;
    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<u64, sea_orm::DbErr>;
    async fn delete_by_user_with_txn(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
    ) -> Result<u64, sea_orm::DbErr>;
}

pub struct SeaOrmCredentialsRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmCredentialsRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialsRepo for SeaOrmCredentialsRepo {
    async fn insert(
        &self,
        model: credentials::ActiveModel,
    ) -> Result<credentials::Model, sea_orm::DbErr> {
        model.insert(self.db.conn()).await
    }

    async fn find_by_user(&self, user_id: i32) -> Result<Vec<credentials::Model>, sea_orm::DbErr> {
        credentials::Entity::find()
            .filter(credentials::Column::UserId.eq(user_id))
            .all(self.db.conn())
            .await
    }

    async fn find_ids_by_user_with_txn(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
    ) -> Result<Vec<i32>, sea_orm::DbErr> {
        credentials::Entity::find()
            .select_only()
            .column(credentials::Column::Id)
            .filter(credentials::Column::UserId.eq(user_id))
            .into_tuple()
            .all(txn)
            .await
    }

    async fn find_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<Option<credentials::Model>, sea_orm::DbErr> {
        credentials::Entity::find_by_id(id).one(txn).await
    }

    async fn delete_by_id_with_txn(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = credentials::Entity::delete_by_id(id).exec(txn).await?;
        Ok(result.rows_affected)
    }

    async fn delete_by_user_with_txn(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = credentials::Entity::delete_many()
            .filter(credentials::Column::UserId.eq(user_id))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}
