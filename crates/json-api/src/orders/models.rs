//! Order responses.

use salvo::{oapi::ToSchema, prelude::StatusError};
use serde::{Deserialize, Serialize};
use storefront::tiers::SubscriptionTier;
use uuid::Uuid;

use storefront_app::domain::orders::{
    data::CheckoutItem,
    records::{EntitlementRecord, OrderItemRecord, OrderRecord, PaymentRecord},
};

use crate::extensions::*;

/// Requested cart line. Prices are always taken from the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub(crate) struct LineRequest {
    pub product_uuid: Uuid,

    /// Tier slug: `3-day`, `weekly`, `monthly` or `lifetime`
    pub tier: String,

    pub quantity: u32,
}

impl LineRequest {
    pub(crate) fn into_checkout_item(self) -> Result<CheckoutItem, StatusError> {
        Ok(CheckoutItem {
            product_uuid: self.product_uuid.into(),
            tier: self
                .tier
                .parse::<SubscriptionTier>()
                .or_400("Unknown subscription tier")?,
            quantity: self.quantity,
        })
    }
}

pub(crate) fn checkout_items(lines: Vec<LineRequest>) -> Result<Vec<CheckoutItem>, StatusError> {
    lines
        .into_iter()
        .map(LineRequest::into_checkout_item)
        .collect()
}

/// Order Line Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderItemResponse {
    pub uuid: Uuid,
    pub product_uuid: Uuid,

    /// Product name when the order was placed
    pub product_name: String,

    pub tier: String,

    /// Catalogue price per unit when the order was placed, in minor units
    pub unit_price: u64,

    pub quantity: u32,

    pub line_total: u64,
}

impl From<OrderItemRecord> for OrderItemResponse {
    fn from(item: OrderItemRecord) -> Self {
        Self {
            uuid: item.uuid.into_uuid(),
            product_uuid: item.product_uuid.into_uuid(),
            tier: item.tier.as_str().to_string(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total: item.line_total(),
            product_name: item.product_name,
        }
    }
}

/// Applied Discount Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderDiscountResponse {
    pub code: String,
    pub amount: u64,
}

/// Order Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrderResponse {
    pub uuid: Uuid,

    /// `pending`, `paid`, `completed`, `cancelled` or `failed`
    pub status: String,

    pub subtotal: u64,

    pub discount: Option<OrderDiscountResponse>,

    /// Amount payable, in minor units
    pub total: u64,

    /// ISO 4217 code
    pub currency: String,

    /// `card` or `crypto`
    pub payment_method: String,

    /// Crypto asset paid with
    pub asset: Option<String>,

    pub items: Vec<OrderItemResponse>,

    pub created_at: String,

    pub updated_at: String,
}

impl From<OrderRecord> for OrderResponse {
    fn from(order: OrderRecord) -> Self {
        Self {
            uuid: order.uuid.into_uuid(),
            status: order.status.as_str().to_string(),
            subtotal: order.subtotal,
            discount: order.discount.map(|discount| OrderDiscountResponse {
                code: discount.code,
                amount: discount.amount,
            }),
            total: order.total,
            currency: order.currency.iso_alpha_code.to_string(),
            payment_method: order.payment_method.as_str().to_string(),
            asset: order
                .payment_method
                .asset()
                .map(|asset| asset.as_str().to_string()),
            items: order.items.into_iter().map(Into::into).collect(),
            created_at: order.created_at.to_string(),
            updated_at: order.updated_at.to_string(),
        }
    }
}

/// Payment Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct PaymentResponse {
    pub uuid: Uuid,
    pub order_uuid: Uuid,

    /// `card` or `crypto`
    pub method: String,

    pub asset: Option<String>,

    /// `pending`, `confirming`, `confirmed`, `underpaid`, `expired` or `failed`
    pub status: String,

    /// Order total in minor units
    pub amount: u64,

    /// Deposit address for crypto payments
    pub address: Option<String>,

    /// Amount of the asset to send, as a decimal string
    pub expected_amount: Option<String>,

    pub required_confirmations: Option<u32>,

    /// Deadline for the transaction to appear
    pub expires_at: Option<String>,

    pub tx_hash: Option<String>,

    pub confirmations: u32,

    pub received_amount: Option<String>,

    /// Card processor reference
    pub reference: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(payment: PaymentRecord) -> Self {
        let crypto = payment.crypto;

        Self {
            uuid: payment.uuid.into_uuid(),
            order_uuid: payment.order_uuid.into_uuid(),
            method: payment.method.as_str().to_string(),
            asset: payment
                .method
                .asset()
                .map(|asset| asset.as_str().to_string()),
            status: payment.status.as_str().to_string(),
            amount: payment.amount,
            address: crypto.as_ref().map(|details| details.address.clone()),
            expected_amount: crypto
                .as_ref()
                .map(|details| details.expected_amount.normalize().to_string()),
            required_confirmations: crypto.as_ref().map(|details| details.required_confirmations),
            expires_at: crypto.as_ref().map(|details| details.expires_at.to_string()),
            tx_hash: payment.tx_hash,
            confirmations: payment.confirmations,
            received_amount: payment
                .received_amount
                .map(|amount| amount.normalize().to_string()),
            reference: payment.reference,
            created_at: payment.created_at.to_string(),
            updated_at: payment.updated_at.to_string(),
        }
    }
}

/// Subscription Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SubscriptionResponse {
    pub uuid: Uuid,
    pub order_uuid: Uuid,
    pub product_uuid: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub tier: String,
    pub starts_at: String,

    /// `None` for lifetime access
    pub expires_at: Option<String>,
}

impl From<EntitlementRecord> for SubscriptionResponse {
    fn from(record: EntitlementRecord) -> Self {
        Self {
            uuid: record.uuid.into_uuid(),
            order_uuid: record.order_uuid.into_uuid(),
            product_uuid: record.product_uuid.into_uuid(),
            product_name: record.product_name,
            product_slug: record.product_slug,
            tier: record.entitlement.tier.as_str().to_string(),
            starts_at: record.entitlement.starts_at.to_string(),
            expires_at: record.entitlement.expires_at.map(|at| at.to_string()),
        }
    }
}
