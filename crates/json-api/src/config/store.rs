//! Store Config

use clap::Args;

/// Storefront settings.
#[derive(Debug, Args)]
pub struct StoreConfig {
    /// ISO 4217 currency all prices are held in
    #[arg(long, env = "STORE_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Sender address for transactional email
    #[arg(long, env = "MAIL_FROM", default_value = "orders@storefront.local")]
    pub mail_from: String,
}
