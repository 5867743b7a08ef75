use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

/// Masks the password component of a connection URL so it can be logged.
pub fn redact_db_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    let Some((userinfo, host)) = authority.rsplit_once('@') else {
        return url.to_string();
    };
    let user = match userinfo.split_once(':') {
        Some((user, _password)) => format!("{user}:***"),
        None => userinfo.to_string(),
    };
    format!("{scheme}://{user}@{host}{path}")
}

pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    if url.trim().is_empty() {
        return Err(DbErr::Custom("DATABASE_URL is not set".to_string()));
    }
    tracing::info!(url = %redact_db_url(url), "connecting to database");

    let mut options = ConnectOptions::new(url.to_string());
    options
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    // Each in-memory SQLite connection is its own database.
    if url.starts_with("sqlite::memory:") {
        options.max_connections(1).min_connections(1);
    }

    Database::connect(options).await
}
