#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    pub plaid_client_id: Option<String>,
    pub plaid_secret: Option<String>,
    pub plaid_env: String,
    pub plaid_base_url: String,
    pub plaid_client_name: String,
    pub plaid_timeout_seconds: u64,
    // Only honoured by debug builds; see gateway::plaid.
    pub plaid_danger_accept_invalid_certs: bool,

    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub transaction_window_days: u32,

    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3333,
            database_url: String::new(),
            plaid_client_id: None,
            plaid_secret: None,
            plaid_env: "sandbox".to_string(),
            plaid_base_url: "https://sandbox.plaid.com".to_string(),
            plaid_client_name: "Finance Tracker".to_string(),
            plaid_timeout_seconds: 30,
            plaid_danger_accept_invalid_certs: false,
            access_token_ttl_seconds: 60 * 60,
            refresh_token_ttl_seconds: 60 * 60 * 24,
            transaction_window_days: 30,
            log_level: "debug".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
