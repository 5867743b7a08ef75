use sea_orm_migration::prelude::*;

use super::users::Users;

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if !manager.has_table("credentials").await? {
        manager
            .create_table(
                Table::create()
                    .table(Credentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credentials::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credentials::UserId).integer().not_null())
                    .col(ColumnDef::new(Credentials::ItemId).string().not_null())
                    .col(ColumnDef::new(Credentials::AccessToken).string().not_null())
                    .col(
                        ColumnDef::new(Credentials::InstitutionName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Credentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("credentials_user_id_fkey")
                            .from(Credentials::Table, Credentials::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("credentials_user_id_idx")
                    .table(Credentials::Table)
                    .col(Credentials::UserId)
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
pub(super) enum Credentials {
    Table,
    Id,
    UserId,
    ItemId,
    AccessToken,
    InstitutionName,
    CreatedAt,
}
