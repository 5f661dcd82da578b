//! Server configuration module

use std::time::Duration;

use clap::Parser;
use jiff::SignedDuration;
use rusty_money::iso;
use storefront_app::{context::AppConfig, payments::ChainStatusConfig};
use thiserror::Error;

use crate::config::{
    database::DatabaseConfig, payments::PaymentsConfig,
    server::ServerRuntimeConfig, store::StoreConfig,
};

pub(crate) mod database;
pub(crate) mod logging;
pub(crate) mod payments;
pub(crate) mod server;
pub(crate) mod store;

pub(crate) use logging::{LogFormat, LoggingConfig};

/// Errors raised while turning parsed settings into application config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown currency code \"{0}\"")]
    UnknownCurrency(String),
}

/// Storefront JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "storefront-json", about = "Storefront JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Storefront settings.
    #[command(flatten)]
    pub store: StoreConfig,

    /// Crypto payment settings.
    #[command(flatten)]
    pub payments: PaymentsConfig,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }

    /// Settings for wiring the application services.
    pub fn app_config(&self) -> Result<AppConfig, ConfigError> {
        let code = self.store.currency.to_ascii_uppercase();
        let currency = iso::find(&code).ok_or(ConfigError::UnknownCurrency(code))?;

        Ok(AppConfig {
            database_url: self.database.database_url.clone(),
            currency,
            chain: ChainStatusConfig {
                base_url: self.payments.chain_status_url.clone(),
                api_key: self.payments.chain_status_api_key.clone(),
                timeout: Duration::from_secs(self.payments.chain_status_timeout_secs),
            },
            payment_window: SignedDuration::from_mins(self.payments.payment_window_minutes),
            poll_interval: Duration::from_secs(self.payments.poll_interval_secs),
            mail_from: self.store.mail_from.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn parse(args: &[&str]) -> Result<ServerConfig, clap::Error> {
        ServerConfig::try_parse_from(
            ["storefront-json", "--database-url", "postgres://localhost/shop"]
                .iter()
                .chain(args),
        )
    }

    #[test]
    fn defaults_produce_app_config() -> TestResult {
        let config = parse(&[])?.app_config()?;

        assert_eq!(config.currency, iso::USD);
        assert_eq!(config.payment_window, SignedDuration::from_mins(60));
        assert_eq!(config.poll_interval, Duration::from_secs(30));

        Ok(())
    }

    #[test]
    fn currency_is_case_insensitive() -> TestResult {
        let config = parse(&["--currency", "eur"])?.app_config()?;

        assert_eq!(config.currency, iso::EUR);

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let result = parse(&["--currency", "XXXX"])?.app_config();

        assert!(
            matches!(result, Err(ConfigError::UnknownCurrency(ref code)) if code == "XXXX"),
            "expected UnknownCurrency, got {result:?}"
        );

        Ok(())
    }
}
