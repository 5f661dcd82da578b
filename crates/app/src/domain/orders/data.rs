//! Order Data

use serde::Deserialize;
use storefront::{
    orders::{OrderStatus, PaymentMethod},
    payments::{CryptoPaymentRequest, PaymentProgress},
    tiers::SubscriptionTier,
};

use crate::domain::{
    orders::records::{OrderRecord, OrderUuid, PaymentRecord},
    products::records::ProductUuid,
};

/// One requested line. Prices always come from the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CheckoutItem {
    pub product_uuid: ProductUuid,
    pub tier: SubscriptionTier,
    pub quantity: u32,
}

/// A customer's request to place an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    pub discount_code: Option<String>,
    pub payment_method: PaymentMethod,
}

/// A placed order and its payment.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: OrderRecord,
    pub payment: PaymentRecord,
}

impl CheckoutOutcome {
    /// The crypto payment to watch, if the order is still waiting for one.
    #[must_use]
    pub fn watchable(&self) -> Option<WatchedPayment> {
        if self.order.status != OrderStatus::Pending {
            return None;
        }

        Some(WatchedPayment {
            order: self.order.uuid,
            request: self.payment.crypto_request()?,
            progress: self.payment.progress()?,
        })
    }
}

/// Result of the hosted card processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardPaymentOutcome {
    Succeeded { reference: String },
    Declined { reason: String },
}

/// The order after a payment change, and the status it moved to, if it moved.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub order: OrderRecord,
    pub transitioned: Option<OrderStatus>,
}

/// An unsettled crypto payment and where it had got to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPayment {
    pub order: OrderUuid,
    pub request: CryptoPaymentRequest,
    pub progress: PaymentProgress,
}
