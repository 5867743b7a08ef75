use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter};

use crate::{entities::user_tokens, state::DatabaseClient};

#[async_trait]
pub trait UserTokensRepo: Send + Sync {
    async fn insert(
        &self,
        model: user_tokens::ActiveModel,
    ) -> Result<user_tokens::Model, sea_orm::DbErr>;
    async fn find_active_by_hash(
        &self,
        token_hash: &str,
        token_type: &str,
    ) -> Result<Option<user_tokens::Model>, sea_orm::DbErr>;
}

pub struct SeaOrmUserTokensRepo {
    db: std::sync::Arc<dyn DatabaseClient>,
}

impl SeaOrmUserTokensRepo {
    pub fn new(db: std::sync::Arc<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    fn active_condition() -> Condition {
        Condition::all()
            .add(user_tokens::Column::RevokedAt.is_null())
            .add(user_tokens::Column::ExpiresAt.gt(Utc::now()))
    }
}

#[async_trait]
impl UserTokensRepo for SeaOrmUserTokensRepo {
    async fn insert(
        &self,
        model: user_tokens::ActiveModel,
    ) -> Result<user_tokens::Model, sea_orm::DbErr> {
        model.insert(self.db.conn()).await
    }

    async fn find_active_by_hash(
        &self,
        token_hash: &str,
        token_type: &str,
    ) -> Result<Option<user_tokens::Model>, sea_orm::DbErr> {
        user_tokens::Entity::find()
            .filter(user_tokens::Column::TokenHash.eq(token_hash))
            .filter(user_tokens::Column::TokenType.eq(token_type))
            .filter(Self::active_condition())
            .one(self.db.conn())
            .await
    }
}
