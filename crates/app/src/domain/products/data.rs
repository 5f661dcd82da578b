//! Products Data

use storefront::tiers::TierPrice;
use thiserror::Error;

use crate::domain::products::records::{ProductUuid, TierPrices};

/// Reasons a product payload is rejected before it reaches storage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductDataError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("slug must be lowercase letters, digits and hyphens")]
    InvalidSlug,

    #[error("at least one tier price is required")]
    NoPrices,

    #[error("tier {0} is priced more than once")]
    DuplicateTier(String),

    #[error("tier {0} must have a non-zero price")]
    ZeroPrice(String),
}

/// New Product Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub uuid: ProductUuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub prices: TierPrices,
    pub is_active: bool,
}

/// Product Update Data
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpdate {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub prices: TierPrices,
    pub is_active: bool,
}

impl NewProduct {
    /// Check the payload against catalogue rules.
    pub fn validate(&self) -> Result<(), ProductDataError> {
        validate_fields(&self.name, &self.slug, &self.prices)
    }
}

impl ProductUpdate {
    /// Check the payload against catalogue rules.
    pub fn validate(&self) -> Result<(), ProductDataError> {
        validate_fields(&self.name, &self.slug, &self.prices)
    }
}

fn validate_fields(name: &str, slug: &str, prices: &[TierPrice]) -> Result<(), ProductDataError> {
    if name.trim().is_empty() {
        return Err(ProductDataError::EmptyName);
    }

    if !is_valid_slug(slug) {
        return Err(ProductDataError::InvalidSlug);
    }

    if prices.is_empty() {
        return Err(ProductDataError::NoPrices);
    }

    for (index, price) in prices.iter().enumerate() {
        if price.price == 0 {
            return Err(ProductDataError::ZeroPrice(price.tier.to_string()));
        }

        if prices
            .iter()
            .skip(index + 1)
            .any(|other| other.tier == price.tier)
        {
            return Err(ProductDataError::DuplicateTier(price.tier.to_string()));
        }
    }

    Ok(())
}

/// Slugs are non-empty runs of `[a-z0-9-]` that neither start nor end with a hyphen.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;
    use storefront::tiers::SubscriptionTier;

    use super::*;

    fn product() -> NewProduct {
        NewProduct {
            uuid: ProductUuid::new(),
            name: "Aimbot".to_string(),
            slug: "aimbot-pro".to_string(),
            description: String::new(),
            image_url: None,
            prices: smallvec![
                TierPrice {
                    tier: SubscriptionTier::Weekly,
                    price: 9_99,
                },
                TierPrice {
                    tier: SubscriptionTier::Lifetime,
                    price: 99_00,
                },
            ],
            is_active: true,
        }
    }

    #[test]
    fn valid_product_passes() {
        assert_eq!(product().validate(), Ok(()));
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("cs2-esp"), "plain slug");
        assert!(!is_valid_slug("CS2"), "uppercase");
        assert!(!is_valid_slug("-esp"), "leading hyphen");
        assert!(!is_valid_slug("esp tool"), "space");
        assert!(!is_valid_slug(""), "empty");
    }

    #[test]
    fn rejects_missing_prices() {
        let mut product = product();

        product.prices.clear();

        assert_eq!(product.validate(), Err(ProductDataError::NoPrices));
    }

    #[test]
    fn rejects_duplicate_tiers() {
        let mut product = product();

        product.prices.push(TierPrice {
            tier: SubscriptionTier::Weekly,
            price: 5_00,
        });

        assert_eq!(
            product.validate(),
            Err(ProductDataError::DuplicateTier("weekly".to_string()))
        );
    }

    #[test]
    fn rejects_blank_name() {
        let mut product = product();

        product.name = "  ".to_string();

        assert_eq!(product.validate(), Err(ProductDataError::EmptyName));
    }
}
