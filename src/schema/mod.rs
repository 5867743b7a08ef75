use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use sea_orm_migration::prelude::*;

mod accounts;
mod credentials;
mod transactions;
mod user_tokens;
mod users;

/// Creates every table and index that is missing. Safe to call on each start-up.
pub async fn apply(conn: &DatabaseConnection) -> Result<(), DbErr> {
    let manager = SchemaManager::new(conn);

    // Parents before children: the foreign keys reference existing tables.
    users::apply(&manager).await?;
    user_tokens::apply(&manager).await?;
    credentials::apply(&manager).await?;
    accounts::apply(&manager).await?;
    transactions::apply(&manager).await?;

    if conn.get_database_backend() == DbBackend::Postgres {
        apply_updated_at_trigger(conn).await?;
    }

    Ok(())
}

async fn apply_updated_at_trigger(conn: &DatabaseConnection) -> Result<(), DbErr> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#
        .to_string(),
    ))
    .await?;

    // users is the only table whose rows are ever updated in place.
    let table = "users";
    let trigger_name = format!("trg_{}_set_updated_at", table);
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        format!(
            r#"
DO $$
BEGIN
  IF NOT EXISTS (
    SELECT 1
    FROM pg_trigger
    WHERE tgname = '{trigger_name}'
      AND tgrelid = '{table}'::regclass
  ) THEN
    EXECUTE 'CREATE TRIGGER {trigger_name}
             BEFORE UPDATE ON {table}
             FOR EACH ROW
             EXECUTE FUNCTION set_updated_at()';
  END IF;
END $$;
"#
        ),
    ))
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn apply_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let conn = test_support::memory_conn().await?;
        apply(&conn).await?;
        apply(&conn).await?;

        let manager = SchemaManager::new(&conn);
        for table in ["users", "user_tokens", "credentials", "accounts", "transactions"] {
            assert!(manager.has_table(table).await?, "missing table {table}");
        }
        Ok(())
    }
}
