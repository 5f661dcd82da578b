//! Pricing

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    cart::{Cart, CartError, CartItem},
    discounts::{AppliedDiscount, DiscountCode, DiscountError},
    tiers::SubscriptionTier,
};

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// Nothing to price.
    #[error("cart is empty")]
    EmptyCart,

    /// The product is not sold, or not sold at this tier.
    #[error("product {0} is not available at tier {1}")]
    Unavailable(Uuid, SubscriptionTier),

    /// Wrapped cart arithmetic error.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The discount code could not be applied.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Sum of line totals, in minor units.
    pub subtotal: u64,

    /// Applied discount, if a code was given.
    pub discount: Option<AppliedDiscount>,

    /// Amount payable, in minor units.
    pub total: u64,

    /// Number of units across all lines.
    pub item_count: u64,
}

/// Price a cart, applying a discount code if one is given.
///
/// # Errors
///
/// - [`PricingError::EmptyCart`]: the cart has no lines.
/// - [`PricingError::Cart`]: the subtotal overflowed.
/// - [`PricingError::Discount`]: the code was rejected for this order.
pub fn quote(
    cart: &Cart,
    discount: Option<&DiscountCode>,
    now: Timestamp,
) -> Result<Quote, PricingError> {
    if cart.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let subtotal = cart.subtotal()?;

    let discount = discount
        .map(|code| code.evaluate(subtotal, now))
        .transpose()?;

    let total = discount.as_ref().map_or(subtotal, |applied| applied.total);

    Ok(Quote {
        subtotal,
        discount,
        total,
        item_count: cart.item_count(),
    })
}

/// Replace every line's price with the authoritative catalogue price.
///
/// `lookup` returns the current price of a product at a tier, or `None` if it is not sold.
///
/// # Errors
///
/// Returns [`PricingError::Unavailable`] for the first line that cannot be priced.
pub fn reprice<F>(items: &[CartItem], lookup: F) -> Result<Vec<CartItem>, PricingError>
where
    F: Fn(Uuid, SubscriptionTier) -> Option<u64>,
{
    items
        .iter()
        .map(|item| {
            let price = lookup(item.product_uuid, item.tier)
                .ok_or(PricingError::Unavailable(item.product_uuid, item.tier))?;

            Ok(CartItem {
                price,
                ..item.clone()
            })
        })
        .collect()
}
