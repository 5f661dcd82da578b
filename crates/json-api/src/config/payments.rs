//! Payments Config

use clap::Args;

/// Crypto payment settings.
#[derive(Debug, Args)]
pub struct PaymentsConfig {
    /// Chain status service address
    #[arg(long, env = "CHAIN_STATUS_URL", default_value = "http://localhost:8700")]
    pub chain_status_url: String,

    /// Chain status service API key
    #[arg(long, env = "CHAIN_STATUS_API_KEY")]
    pub chain_status_api_key: Option<String>,

    /// Chain status request timeout in seconds
    #[arg(long, env = "CHAIN_STATUS_TIMEOUT_SECONDS", default_value_t = 10_u64)]
    pub chain_status_timeout_secs: u64,

    /// Minutes a customer has to send a crypto payment
    #[arg(long, env = "PAYMENT_WINDOW_MINUTES", default_value_t = 60_i64)]
    pub payment_window_minutes: i64,

    /// Seconds between chain lookups for each unsettled payment
    #[arg(long, env = "PAYMENT_POLL_INTERVAL_SECONDS", default_value_t = 30_u64)]
    pub poll_interval_secs: u64,
}
