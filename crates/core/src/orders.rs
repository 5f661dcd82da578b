//! Orders
//!
//! Order and payment lifecycles, and the entitlements a completed order grants.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::tiers::{SubscriptionTier, TierError};

/// Errors raised by order state changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The requested status change is not allowed.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// A stored status, method or asset name is not recognised.
    #[error("unknown value \"{0}\"")]
    UnknownValue(String),

    /// Entitlement window could not be computed.
    #[error(transparent)]
    Tier(#[from] TierError),
}

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment.
    Pending,

    /// Payment confirmed, fulfilment outstanding.
    Paid,

    /// Entitlements granted.
    Completed,

    /// Cancelled before payment.
    Cancelled,

    /// Payment failed, expired or was short.
    Failed,
}

impl OrderStatus {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether `self → next` is a permitted change.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled | Self::Failed)
                | (Self::Paid, Self::Completed)
        )
    }

    /// Move to `next` if permitted.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] if the change is not permitted.
    pub fn transition_to(self, next: Self) -> Result<Self, OrderError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether no further changes are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            _ => Err(OrderError::UnknownValue(value.to_string())),
        }
    }
}

/// Supported cryptocurrencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoAsset {
    /// BTC
    Bitcoin,

    /// ETH
    Ethereum,

    /// LTC
    Litecoin,
}

impl CryptoAsset {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::Litecoin => "litecoin",
        }
    }

    /// Ticker symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Bitcoin => "BTC",
            Self::Ethereum => "ETH",
            Self::Litecoin => "LTC",
        }
    }

    /// Confirmations required before a payment counts as settled.
    #[must_use]
    pub const fn default_confirmations(self) -> u32 {
        match self {
            Self::Bitcoin => 2,
            Self::Ethereum => 12,
            Self::Litecoin => 6,
        }
    }
}

impl FromStr for CryptoAsset {
    type Err = OrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "litecoin" | "ltc" => Ok(Self::Litecoin),
            _ => Err(OrderError::UnknownValue(value.to_string())),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "asset", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the hosted processor.
    Card,

    /// On-chain payment.
    Crypto(CryptoAsset),
}

impl PaymentMethod {
    /// Storage name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Crypto(_) => "crypto",
        }
    }

    /// Rebuild a method from its stored method and asset names.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::UnknownValue`] for unrecognised names, or a crypto method with
    /// no asset.
    pub fn from_parts(method: &str, asset: Option<&str>) -> Result<Self, OrderError> {
        match (method, asset) {
            ("card", _) => Ok(Self::Card),
            ("crypto", Some(asset)) => Ok(Self::Crypto(asset.parse()?)),
            _ => Err(OrderError::UnknownValue(method.to_string())),
        }
    }

    /// Asset paid with, if any.
    #[must_use]
    pub const fn asset(self) -> Option<CryptoAsset> {
        match self {
            Self::Card => None,
            Self::Crypto(asset) => Some(asset),
        }
    }
}

/// Payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No transaction seen yet.
    Pending,

    /// Transaction seen, waiting for confirmations.
    Confirming,

    /// Settled.
    Confirmed,

    /// Transaction seen for less than the expected amount.
    Underpaid,

    /// No transaction before the deadline.
    Expired,

    /// Rejected by the processor.
    Failed,
}

impl PaymentStatus {
    /// Storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::Underpaid => "underpaid",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirming" => Ok(Self::Confirming),
            "confirmed" => Ok(Self::Confirmed),
            "underpaid" => Ok(Self::Underpaid),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            _ => Err(OrderError::UnknownValue(value.to_string())),
        }
    }
}

/// Access to a product granted by a completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Product unlocked.
    pub product_uuid: Uuid,

    /// Tier bought.
    pub tier: SubscriptionTier,

    /// Start of access.
    pub starts_at: Timestamp,

    /// End of access, `None` for lifetime.
    pub expires_at: Option<Timestamp>,
}

impl Entitlement {
    /// Entitlement for `quantity` units of a tier starting at `starts_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the access window overflows.
    pub fn grant(
        product_uuid: Uuid,
        tier: SubscriptionTier,
        quantity: u32,
        starts_at: Timestamp,
    ) -> Result<Self, OrderError> {
        Ok(Self {
            product_uuid,
            tier,
            starts_at,
            expires_at: tier.access_until(starts_at, quantity)?,
        })
    }

    /// Whether access is live at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.starts_at <= now && self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}
