//! Storefront
//!
//! Pricing, discount and payment-tracking core for a subscription storefront. Everything in
//! this crate is pure: persistence, HTTP and timers live in `storefront-app`.

pub mod cart;
pub mod discounts;
pub mod email;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod tiers;
