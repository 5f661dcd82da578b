//! Product request bodies.

use salvo::{oapi::ToSchema, prelude::StatusError};
use serde::{Deserialize, Serialize};
use storefront::tiers::{SubscriptionTier, TierPrice};

use storefront_app::domain::products::records::TierPrices;

use crate::extensions::*;

/// Tier price as sent by the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub(crate) struct TierPriceRequest {
    /// Tier slug: `3-day`, `weekly`, `monthly` or `lifetime`
    pub tier: String,

    /// Price in minor units
    pub price: u64,
}

/// Product fields shared by create and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub(crate) struct ProductRequest {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub prices: Vec<TierPriceRequest>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductRequest {
    pub(crate) fn tier_prices(&self) -> Result<TierPrices, StatusError> {
        self.prices
            .iter()
            .map(|price| {
                Ok(TierPrice {
                    tier: price
                        .tier
                        .parse::<SubscriptionTier>()
                        .or_400("Unknown subscription tier")?,
                    price: price.price,
                })
            })
            .collect()
    }
}
