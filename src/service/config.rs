use std::{env, sync::Arc};

use crate::config::{Config, LogFormat};

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

impl ConfigServiceImpl {
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn normalize(value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = Self::strip_wrapping_quotes(trimmed).trim();
        if normalized.is_empty() {
            None
        } else {
            Some(normalized.to_string())
        }
    }

    fn env_nonempty(key: &str) -> Option<String> {
        env::var(key).ok().and_then(|value| Self::normalize(&value))
    }

    fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
        Self::env_nonempty(key).and_then(|value| value.parse::<T>().ok())
    }

    fn env_bool(key: &str, default: bool) -> bool {
        Self::env_nonempty(key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    fn plaid_host(plaid_env: &str) -> &'static str {
        match plaid_env {
            "production" => "https://production.plaid.com",
            "development" => "https://development.plaid.com",
            _ => "https://sandbox.plaid.com",
        }
    }

    /// Reads the process environment once. Unset or unparsable values fall back to defaults.
    pub fn new() -> Self {
        let defaults = Config::default();

        let plaid_env = Self::env_nonempty("PLAID_ENV")
            .map(|value| value.to_ascii_lowercase())
            .filter(|value| matches!(value.as_str(), "sandbox" | "development" | "production"))
            .unwrap_or(defaults.plaid_env);
        let plaid_base_url = Self::env_nonempty("PLAID_BASE_URL")
            .unwrap_or_else(|| Self::plaid_host(&plaid_env).to_string());
        let log_format = match Self::env_nonempty("LOG_FORMAT").as_deref() {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self::from_config(Config {
            port: Self::env_parse("PORT").unwrap_or(defaults.port),
            database_url: Self::env_nonempty("DATABASE_URL").unwrap_or_default(),
            plaid_client_id: Self::env_nonempty("PLAID_CLIENT_ID"),
            plaid_secret: Self::env_nonempty("PLAID_SECRET"),
            plaid_env,
            plaid_base_url,
            plaid_client_name: Self::env_nonempty("PLAID_CLIENT_NAME")
                .unwrap_or(defaults.plaid_client_name),
            plaid_timeout_seconds: Self::env_parse("PLAID_TIMEOUT_SECONDS")
                .filter(|seconds| *seconds > 0)
                .unwrap_or(defaults.plaid_timeout_seconds),
            plaid_danger_accept_invalid_certs: Self::env_bool(
                "PLAID_DANGER_ACCEPT_INVALID_CERTS",
                false,
            ),
            access_token_ttl_seconds: Self::env_parse("ACCESS_TOKEN_TTL_SECONDS")
                .unwrap_or(defaults.access_token_ttl_seconds),
            refresh_token_ttl_seconds: Self::env_parse("REFRESH_TOKEN_TTL_SECONDS")
                .unwrap_or(defaults.refresh_token_ttl_seconds),
            transaction_window_days: Self::env_parse("TRANSACTION_WINDOW_DAYS")
                .unwrap_or(defaults.transaction_window_days),
            log_level: Self::env_nonempty("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_blank_and_quoted_values() {
        assert_eq!(ConfigServiceImpl::normalize("   "), None);
        assert_eq!(ConfigServiceImpl::normalize("\"\""), None);
        assert_eq!(
            ConfigServiceImpl::normalize(" 'secret' "),
            Some("secret".to_string())
        );
        assert_eq!(
            ConfigServiceImpl::normalize("\"sandbox\""),
            Some("sandbox".to_string())
        );
    }

    #[test]
    fn plaid_host_falls_back_to_sandbox() {
        assert_eq!(
            ConfigServiceImpl::plaid_host("production"),
            "https://production.plaid.com"
        );
        assert_eq!(
            ConfigServiceImpl::plaid_host("staging"),
            "https://sandbox.plaid.com"
        );
    }
}
