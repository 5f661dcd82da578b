//! Subscription Tiers

use std::{fmt, str::FromStr};

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while working with tiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TierError {
    /// The slug does not name a known tier.
    #[error("unknown subscription tier \"{0}\"")]
    UnknownTier(String),

    /// Access window arithmetic left the supported timestamp range.
    #[error("access window is out of range")]
    OutOfRange,
}

/// Time-boxed access duration, priced independently per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubscriptionTier {
    /// Three days of access.
    #[serde(rename = "3-day")]
    ThreeDay,

    /// Seven days of access.
    #[serde(rename = "weekly")]
    Weekly,

    /// Thirty days of access.
    #[serde(rename = "monthly")]
    Monthly,

    /// Access that never expires.
    #[serde(rename = "lifetime")]
    Lifetime,
}

impl SubscriptionTier {
    /// All tiers, shortest first.
    pub const ALL: [Self; 4] = [Self::ThreeDay, Self::Weekly, Self::Monthly, Self::Lifetime];

    /// Slug used in storage and over the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThreeDay => "3-day",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Lifetime => "lifetime",
        }
    }

    /// Human readable label used in emails.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ThreeDay => "3 Day",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Lifetime => "Lifetime",
        }
    }

    /// Days of access granted per unit, `None` for lifetime.
    #[must_use]
    pub const fn access_days(self) -> Option<u32> {
        match self {
            Self::ThreeDay => Some(3),
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::Lifetime => None,
        }
    }

    /// End of the access window for `quantity` units bought at `start`.
    ///
    /// Returns `Ok(None)` for lifetime access.
    ///
    /// # Errors
    ///
    /// Returns [`TierError::OutOfRange`] if the window overflows the timestamp range.
    pub fn access_until(
        self,
        start: Timestamp,
        quantity: u32,
    ) -> Result<Option<Timestamp>, TierError> {
        let Some(days) = self.access_days() else {
            return Ok(None);
        };

        let hours = i64::from(days) * i64::from(quantity) * 24;

        start
            .checked_add(SignedDuration::from_hours(hours))
            .map(Some)
            .map_err(|_source| TierError::OutOfRange)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = TierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| TierError::UnknownTier(value.to_string()))
    }
}

/// A product's price for a single tier, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrice {
    /// Tier being priced.
    pub tier: SubscriptionTier,

    /// Price in minor units (pence/cents).
    pub price: u64,
}

/// Find the price for `tier` in a product's price list.
pub fn price_for(prices: &[TierPrice], tier: SubscriptionTier) -> Option<u64> {
    prices
        .iter()
        .find(|price| price.tier == tier)
        .map(|price| price.price)
}
