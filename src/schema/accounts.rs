use sea_orm_migration::prelude::*;

use super::credentials::Credentials;

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if !manager.has_table("accounts").await? {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::CredentialId).integer().not_null())
                    .col(
                        ColumnDef::new(Accounts::ProviderAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::AccountType).string().not_null())
                    .col(ColumnDef::new(Accounts::Subtype).string())
                    .col(ColumnDef::new(Accounts::CurrentBalance).decimal_len(12, 2))
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("accounts_credential_id_fkey")
                            .from(Accounts::Table, Accounts::CredentialId)
                            .to(Credentials::Table, Credentials::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("accounts_credential_id_idx")
                    .table(Accounts::Table)
                    .col(Accounts::CredentialId)
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
pub(super) enum Accounts {
    Table,
    Id,
    CredentialId,
    ProviderAccountId,
    Name,
    AccountType,
    Subtype,
    CurrentBalance,
    CreatedAt,
}
