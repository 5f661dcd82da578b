//! Storefront Domain Concerns

pub mod discounts;
pub mod orders;
pub mod products;
