use sea_orm_migration::prelude::*;

use super::accounts::Accounts;

pub async fn apply(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    if !manager.has_table("transactions").await? {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::AccountId).integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Date).date().not_null())
                    .col(ColumnDef::new(Transactions::Name).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Category)
                            .string()
                            .not_null()
                            .default("Uncategorized"),
                    )
                    .col(
                        ColumnDef::new(Transactions::Pending)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("transactions_account_id_fkey")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("transactions_account_id_date_idx")
                    .table(Transactions::Table)
                    .col(Transactions::AccountId)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    AccountId,
    TransactionId,
    Date,
    Name,
    Amount,
    Category,
    Pending,
    CreatedAt,
}
