//! Order Records

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Serialize;
use storefront::{
    email::{OrderSummary, SummaryLine},
    orders::{Entitlement, OrderStatus, PaymentMethod, PaymentStatus},
    payments::{CryptoPaymentRequest, PaymentProgress},
    tiers::SubscriptionTier,
};

use crate::{auth::UserUuid, domain::products::records::ProductUuid, uuids::TypedUuid};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order Item UUID
pub type OrderItemUuid = TypedUuid<OrderItemRecord>;

/// Payment UUID
pub type PaymentUuid = TypedUuid<PaymentRecord>;

/// Entitlement UUID
pub type EntitlementUuid = TypedUuid<EntitlementRecord>;

/// Discount applied when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDiscount {
    pub code: String,
    pub amount: u64,
}

/// Order Record
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub customer_email: String,
    pub status: OrderStatus,
    pub subtotal: u64,
    pub discount: Option<OrderDiscount>,
    pub total: u64,
    pub currency: &'static Currency,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderItemRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OrderRecord {
    /// Data needed to render the order's emails.
    #[must_use]
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_uuid: self.uuid.into_uuid(),
            customer_email: self.customer_email.clone(),
            lines: self
                .items
                .iter()
                .map(|item| SummaryLine {
                    name: item.product_name.clone(),
                    tier: item.tier,
                    quantity: item.quantity,
                    line_total: item.line_total(),
                })
                .collect(),
            discount: self
                .discount
                .as_ref()
                .map(|discount| (discount.code.clone(), discount.amount)),
            total: self.total,
            currency: self.currency,
        }
    }
}

/// Order Item Record
#[derive(Debug, Clone)]
pub struct OrderItemRecord {
    pub uuid: OrderItemUuid,
    pub product_uuid: ProductUuid,
    pub product_name: String,
    pub tier: SubscriptionTier,
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderItemRecord {
    /// Unit price times quantity. Bounded by the order subtotal, so it cannot overflow in
    /// practice; saturates if it ever would.
    #[must_use]
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

/// Where a crypto payment should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoPaymentDetails {
    pub address: String,
    pub expected_amount: Decimal,
    pub required_confirmations: u32,
    pub expires_at: Timestamp,
}

/// Payment Record
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub uuid: PaymentUuid,
    pub order_uuid: OrderUuid,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: u64,
    pub crypto: Option<CryptoPaymentDetails>,
    pub tx_hash: Option<String>,
    pub confirmations: u32,
    pub received_amount: Option<Decimal>,
    pub reference: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// What the poller watches for, if this is a crypto payment.
    #[must_use]
    pub fn crypto_request(&self) -> Option<CryptoPaymentRequest> {
        let asset = self.method.asset()?;
        let crypto = self.crypto.as_ref()?;

        Some(CryptoPaymentRequest {
            address: crypto.address.clone(),
            expected_amount: crypto.expected_amount,
            asset,
            required_confirmations: crypto.required_confirmations,
            expires_at: crypto.expires_at,
        })
    }

    /// Stored crypto progress. `None` for card payments and processor failures.
    #[must_use]
    pub fn progress(&self) -> Option<PaymentProgress> {
        self.method.asset()?;

        let tx_hash = self.tx_hash.clone().unwrap_or_default();
        let confirmations = self.confirmations;

        match self.status {
            PaymentStatus::Pending => Some(PaymentProgress::AwaitingTransaction),
            PaymentStatus::Confirming => Some(PaymentProgress::Confirming {
                tx_hash,
                confirmations,
            }),
            PaymentStatus::Confirmed => Some(PaymentProgress::Confirmed {
                tx_hash,
                confirmations,
            }),
            PaymentStatus::Underpaid => Some(PaymentProgress::Underpaid {
                tx_hash,
                received: self.received_amount.unwrap_or_default(),
            }),
            PaymentStatus::Expired => Some(PaymentProgress::Expired),
            PaymentStatus::Failed => None,
        }
    }
}

/// Entitlement Record
#[derive(Debug, Clone)]
pub struct EntitlementRecord {
    pub uuid: EntitlementUuid,
    pub user_uuid: UserUuid,
    pub order_uuid: OrderUuid,
    pub product_uuid: ProductUuid,
    pub product_name: String,
    pub product_slug: String,
    pub entitlement: Entitlement,
    pub created_at: Timestamp,
}
