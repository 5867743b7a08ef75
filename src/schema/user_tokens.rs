use sea_orm_migration::prelude::*;

use super::users::Users;

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if !manager.has_table("user_tokens").await? {
        manager
            .create_table(
                Table::create()
                    .table(UserTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserTokens::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserTokens::UserId).integer().not_null())
                    .col(ColumnDef::new(UserTokens::TokenHash).string().not_null())
                    .col(ColumnDef::new(UserTokens::TokenType).string().not_null())
                    .col(
                        ColumnDef::new(UserTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserTokens::RevokedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(UserTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("user_tokens_user_id_fkey")
                            .from(UserTokens::Table, UserTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("user_tokens_token_hash_unique")
                    .table(UserTokens::Table)
                    .col(UserTokens::TokenHash)
                    .unique()
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
enum UserTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    TokenType,
    ExpiresAt,
    RevokedAt,
    CreatedAt,
}
