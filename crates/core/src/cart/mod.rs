//! Cart
//!
//! Client-side cart state: line items keyed by product and tier, with derived subtotal and
//! item count. Prices held here are display prices only; checkout re-prices every line.

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::tiers::SubscriptionTier;

pub mod store;

/// Errors raised by cart mutations and totals.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Items must be added with a positive quantity.
    #[error("quantity must be at least one")]
    ZeroQuantity,

    /// No line exists for the given product and tier.
    #[error("product {0} ({1}) is not in the cart")]
    NotInCart(Uuid, SubscriptionTier),

    /// Quantity or subtotal arithmetic overflowed.
    #[error("cart arithmetic overflowed")]
    Overflow,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier.
    pub product_uuid: Uuid,

    /// Product display name.
    pub name: String,

    /// Product slug.
    pub slug: String,

    /// Unit price in minor units for the chosen tier.
    pub price: u64,

    /// Product image.
    pub image_url: Option<String>,

    /// Number of units of the tier.
    pub quantity: u32,

    /// Chosen subscription tier.
    pub tier: SubscriptionTier,
}

impl CartItem {
    /// Whether this line is for the given product and tier.
    #[must_use]
    pub fn is_line(&self, product: Uuid, tier: SubscriptionTier) -> bool {
        self.product_uuid == product && self.tier == tier
    }

    /// Price multiplied by quantity.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Overflow`] if the line total does not fit in a `u64`.
    pub fn line_total(&self) -> Result<u64, CartError> {
        self.price
            .checked_mul(u64::from(self.quantity))
            .ok_or(CartError::Overflow)
    }
}

/// Cart
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
    currency: &'static Currency,
}

impl Cart {
    /// Create an empty cart in the given currency.
    pub fn new(currency: &'static Currency) -> Self {
        Cart {
            items: Vec::new(),
            currency,
        }
    }

    /// Create a cart from previously stored lines.
    pub fn with_items(items: impl Into<Vec<CartItem>>, currency: &'static Currency) -> Self {
        Cart {
            items: items.into(),
            currency,
        }
    }

    /// Add an item, merging quantities with an existing line for the same product and tier.
    ///
    /// # Errors
    ///
    /// - [`CartError::ZeroQuantity`]: the item has a quantity of zero.
    /// - [`CartError::Overflow`]: the merged quantity does not fit in a `u32`.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.is_line(item.product_uuid, item.tier))
        {
            line.quantity = line
                .quantity
                .checked_add(item.quantity)
                .ok_or(CartError::Overflow)?;

            return Ok(());
        }

        self.items.push(item);

        Ok(())
    }

    /// Remove the line for a product and tier.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if there is no such line.
    pub fn remove_item(
        &mut self,
        product: Uuid,
        tier: SubscriptionTier,
    ) -> Result<CartItem, CartError> {
        let index = self
            .items
            .iter()
            .position(|line| line.is_line(product, tier))
            .ok_or(CartError::NotInCart(product, tier))?;

        Ok(self.items.remove(index))
    }

    /// Set the quantity of a line. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if there is no such line.
    pub fn update_quantity(
        &mut self,
        product: Uuid,
        tier: SubscriptionTier,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product, tier).map(|_removed| ());
        }

        let line = self
            .items
            .iter_mut()
            .find(|line| line.is_line(product, tier))
            .ok_or(CartError::NotInCart(product, tier))?;

        line.quantity = quantity;

        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of every line total, in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Overflow`] if the subtotal does not fit in a `u64`.
    pub fn subtotal(&self) -> Result<u64, CartError> {
        self.items.iter().try_fold(0_u64, |acc, item| {
            acc.checked_add(item.line_total()?).ok_or(CartError::Overflow)
        })
    }

    /// Subtotal as money in the cart currency.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Overflow`] if the subtotal does not fit in an `i64`.
    pub fn subtotal_money(&self) -> Result<Money<'static, Currency>, CartError> {
        let minor = i64::try_from(self.subtotal()?).map_err(|_source| CartError::Overflow)?;

        Ok(Money::from_minor(minor, self.currency))
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Find the line for a product and tier.
    pub fn get(&self, product: Uuid, tier: SubscriptionTier) -> Option<&CartItem> {
        self.items.iter().find(|line| line.is_line(product, tier))
    }

    /// Get the lines in the cart.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Get the number of lines in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the currency of the cart.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}
