use std::sync::Arc;

use finance_api::{
    logging::setup_logging,
    service::config::{ConfigService, ConfigServiceImpl},
    state::AppState,
};

#[tokio::main]
async fn main() {
    let config: Arc<dyn ConfigService> = Arc::new(ConfigServiceImpl::new());
    setup_logging(&config.values().log_level, config.values().log_format);

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("0.0.0.0:{}", state.config().port());
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%bind_addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%bind_addr, "listening");

    if let Err(err) = axum::serve(listener, finance_api::app(state)).await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
