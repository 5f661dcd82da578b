//! Product Records

use jiff::Timestamp;
use smallvec::SmallVec;
use storefront::tiers::{SubscriptionTier, TierPrice, price_for};

use crate::uuids::TypedUuid;

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Tier prices of a product, one per tier at most.
pub type TierPrices = SmallVec<[TierPrice; 4]>;

/// Product Record
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub prices: TierPrices,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl ProductRecord {
    /// Current price at `tier`, if the product is sold at it.
    #[must_use]
    pub fn price_for(&self, tier: SubscriptionTier) -> Option<u64> {
        price_for(&self.prices, tier)
    }

    /// Whether the product can be bought.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}
