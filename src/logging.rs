use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

use crate::config::LogFormat;

fn build_filter(level: &str) -> Targets {
    let quiet = Targets::new()
        .with_target("sqlx", Level::INFO)
        .with_target("sea_orm", Level::INFO)
        .with_target("hyper_util", Level::INFO)
        .with_target("reqwest", Level::INFO);

    // A plain level ("info") keeps the quiet targets; a directive list replaces them.
    match Level::from_str(level) {
        Ok(level) => quiet.with_default(level),
        Err(_) => Targets::from_str(level).unwrap_or_else(|err| {
            eprintln!("invalid LOG_LEVEL {level:?}: {err}; using debug");
            quiet.with_default(Level::DEBUG)
        }),
    }
}

pub fn setup_logging(level: &str, format: LogFormat) {
    let filter = build_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_file(true)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .init(),
    }
}
