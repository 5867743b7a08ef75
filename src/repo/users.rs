use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter};

use crate::{entities::users, state::DatabaseClient};

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn insert(&self, model: users::ActiveModel) -> Result<users::Model, sea_orm::DbErr>;
    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>, sea_orm::DbErr>;
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<users::Model>, sea_orm::DbErr>;
    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, sea_orm::DbErr>;
}

pub struct SeaOrmUsersRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmUsersRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsersRepo for SeaOrmUsersRepo {
    async fn insert(&self, model: users::ActiveModel) -> Result<users::Model, sea_orm::DbErr> {
        model.insert(self.db.conn()).await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>, sea_orm::DbErr> {
        users::Entity::find_by_id(id).one(self.db.conn()).await
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<users::Model>, sea_orm::DbErr> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db.conn())
            .await
    }

    async fn update(&self, model: users::ActiveModel) -> Result<users::Model, sea_orm::DbErr> {
        model.update(self.db.conn()).await
    }
}
