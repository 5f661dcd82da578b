//! Discounts
//!
//! Discount codes redeemable at checkout for a percentage or fixed reduction, subject to
//! activation, expiry, usage limits and a minimum order amount.

use jiff::Timestamp;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a normalised code.
pub const MAX_CODE_LEN: usize = 32;

/// Decimal places a percentage may carry; storage keeps no more.
pub const PERCENTAGE_SCALE: u32 = 2;

/// Reasons a code cannot be applied to an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// The code has been switched off.
    #[error("discount code is not active")]
    Inactive,

    /// The code expired at or before the evaluation time.
    #[error("discount code has expired")]
    Expired,

    /// Every permitted use has been redeemed.
    #[error("discount code usage limit reached")]
    UsageLimitReached,

    /// The order is below the code's minimum amount (minimum, in minor units).
    #[error("order amount is below the minimum of {0}")]
    BelowMinimum(u64),

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed")]
    PercentConversion,
}

/// Problems with an admin-submitted discount code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountDraftError {
    /// The code is empty after trimming.
    #[error("code must not be empty")]
    EmptyCode,

    /// The code is longer than [`MAX_CODE_LEN`].
    #[error("code must be at most {MAX_CODE_LEN} characters")]
    CodeTooLong,

    /// The code contains a character outside `A-Z`, `0-9`, `_` and `-`.
    #[error("code contains invalid character {0:?}")]
    InvalidCodeCharacter(char),

    /// Percentages must be greater than zero and at most one hundred.
    #[error("percentage must be greater than 0 and at most 100")]
    PercentageOutOfRange,

    /// The percentage has more decimal places than [`PERCENTAGE_SCALE`].
    #[error("percentage must have at most {PERCENTAGE_SCALE} decimal places")]
    PercentageTooPrecise,

    /// Fixed discounts must be greater than zero.
    #[error("fixed discount must be greater than zero")]
    ZeroValue,

    /// A usage limit, when set, must allow at least one use.
    #[error("maximum uses must be greater than zero")]
    ZeroMaximumUses,
}

/// How much a code takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// Percentage of the order amount, e.g. `15` for 15%.
    Percentage(Decimal),

    /// Fixed amount in minor units.
    Fixed(u64),
}

impl DiscountValue {
    /// Storage name of the discount type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Percentage(_) => "percentage",
            Self::Fixed(_) => "fixed",
        }
    }

    /// Discount amount for an order, capped at the order amount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::PercentConversion`] if a percentage cannot be represented in
    /// minor units.
    pub fn amount_off(&self, order_amount: u64) -> Result<u64, DiscountError> {
        let amount = match self {
            Self::Percentage(percent) => percent_of_minor(*percent, order_amount)?,
            Self::Fixed(amount) => *amount,
        };

        Ok(amount.min(order_amount))
    }
}

/// A redeemable discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    /// Normalised code.
    pub code: String,

    /// Reduction applied.
    pub value: DiscountValue,

    /// Minimum order amount in minor units.
    pub minimum_amount: Option<u64>,

    /// Maximum number of redemptions.
    pub maximum_uses: Option<u32>,

    /// Redemptions so far.
    pub current_uses: u32,

    /// Whether the code can be redeemed at all.
    pub is_active: bool,

    /// When the code stops being redeemable.
    pub expires_at: Option<Timestamp>,
}

impl DiscountCode {
    /// Check this code against an order amount at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failing constraint, checked in the order: active, expiry, usage
    /// limit, minimum amount.
    pub fn check(&self, order_amount: u64, now: Timestamp) -> Result<(), DiscountError> {
        if !self.is_active {
            return Err(DiscountError::Inactive);
        }

        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(DiscountError::Expired);
        }

        if self
            .maximum_uses
            .is_some_and(|maximum| self.current_uses >= maximum)
        {
            return Err(DiscountError::UsageLimitReached);
        }

        if let Some(minimum) = self.minimum_amount
            && order_amount < minimum
        {
            return Err(DiscountError::BelowMinimum(minimum));
        }

        Ok(())
    }

    /// Apply this code to an order amount at `now`.
    ///
    /// # Errors
    ///
    /// See [`DiscountCode::check`] and [`DiscountValue::amount_off`].
    pub fn evaluate(
        &self,
        order_amount: u64,
        now: Timestamp,
    ) -> Result<AppliedDiscount, DiscountError> {
        self.check(order_amount, now)?;

        let amount = self.value.amount_off(order_amount)?;

        Ok(AppliedDiscount {
            code: self.code.clone(),
            amount,
            total: order_amount - amount,
        })
    }

    /// Whether another redemption is permitted.
    #[must_use]
    pub fn has_uses_remaining(&self) -> bool {
        self.maximum_uses
            .is_none_or(|maximum| self.current_uses < maximum)
    }
}

/// Outcome of applying a code to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    /// Normalised code that was applied.
    pub code: String,

    /// Amount taken off, in minor units.
    pub amount: u64,

    /// Order amount after the discount, in minor units.
    pub total: u64,
}

/// Admin-submitted discount code, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountDraft {
    /// Code as typed.
    pub code: String,

    /// Reduction applied.
    pub value: DiscountValue,

    /// Minimum order amount in minor units.
    pub minimum_amount: Option<u64>,

    /// Maximum number of redemptions.
    pub maximum_uses: Option<u32>,

    /// Whether the code can be redeemed.
    pub is_active: bool,

    /// When the code stops being redeemable.
    pub expires_at: Option<Timestamp>,
}

impl DiscountDraft {
    /// Validate the draft and normalise its code.
    ///
    /// # Errors
    ///
    /// Returns the first problem found with the code, value or usage limit.
    pub fn validate(mut self) -> Result<Self, DiscountDraftError> {
        self.code = validate_code(&self.code)?;

        match self.value {
            DiscountValue::Percentage(percent)
                if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED =>
            {
                return Err(DiscountDraftError::PercentageOutOfRange);
            }
            DiscountValue::Percentage(percent) if percent.normalize().scale() > PERCENTAGE_SCALE => {
                return Err(DiscountDraftError::PercentageTooPrecise);
            }
            DiscountValue::Fixed(0) => return Err(DiscountDraftError::ZeroValue),
            DiscountValue::Percentage(_) | DiscountValue::Fixed(_) => {}
        }

        if self.maximum_uses == Some(0) {
            return Err(DiscountDraftError::ZeroMaximumUses);
        }

        Ok(self)
    }
}

/// Normalise a code for storage and lookup: trimmed and upper-cased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Normalise a code and check it only uses permitted characters.
///
/// # Errors
///
/// Returns an error if the code is empty, too long, or contains invalid characters.
pub fn validate_code(code: &str) -> Result<String, DiscountDraftError> {
    let code = normalize_code(code);

    if code.is_empty() {
        return Err(DiscountDraftError::EmptyCode);
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(DiscountDraftError::CodeTooLong);
    }

    if let Some(invalid) = code
        .chars()
        .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
    {
        return Err(DiscountDraftError::InvalidCodeCharacter(invalid));
    }

    Ok(code)
}

/// Calculate `percent`% of a minor unit amount, rounded half away from zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: Decimal, minor: u64) -> Result<u64, DiscountError> {
    Decimal::from(minor)
        .checked_mul(percent)
        .and_then(|applied| applied.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(DiscountError::PercentConversion)
}
