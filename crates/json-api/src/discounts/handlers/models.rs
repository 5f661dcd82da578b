//! Discount request and response bodies.

use jiff::Timestamp;
use rust_decimal::Decimal;
use salvo::{oapi::ToSchema, prelude::StatusError};
use serde::{Deserialize, Serialize};
use storefront::discounts::{DiscountDraft, DiscountValue};
use uuid::Uuid;

use storefront_app::domain::discounts::records::DiscountRecord;

use crate::extensions::*;

/// Discount code settings, used by create and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub(crate) struct DiscountRequest {
    /// Code customers type at checkout; case-insensitive
    pub code: String,

    /// Percentage off as a decimal string, e.g. `"12.5"`
    #[serde(default)]
    pub percentage: Option<String>,

    /// Fixed amount off in minor units
    #[serde(default)]
    pub fixed_amount: Option<u64>,

    /// Minimum order amount in minor units
    #[serde(default)]
    pub minimum_amount: Option<u64>,

    /// Maximum number of redemptions
    #[serde(default)]
    pub maximum_uses: Option<u32>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    /// RFC 3339 timestamp after which the code stops working
    #[serde(default)]
    pub expires_at: Option<String>,
}

const fn default_active() -> bool {
    true
}

impl DiscountRequest {
    pub(crate) fn into_draft(self) -> Result<DiscountDraft, StatusError> {
        let value = match (self.percentage, self.fixed_amount) {
            (Some(percentage), None) => DiscountValue::Percentage(
                percentage
                    .trim()
                    .parse::<Decimal>()
                    .or_400("Percentage must be a decimal number")?,
            ),
            (None, Some(amount)) => DiscountValue::Fixed(amount),
            _ => {
                return Err(StatusError::bad_request()
                    .brief("Exactly one of percentage and fixed_amount is required"));
            }
        };

        let expires_at = self
            .expires_at
            .map(|value| value.parse::<Timestamp>())
            .transpose()
            .or_400("expires_at must be an RFC 3339 timestamp")?;

        Ok(DiscountDraft {
            code: self.code,
            value,
            minimum_amount: self.minimum_amount,
            maximum_uses: self.maximum_uses,
            is_active: self.is_active,
            expires_at,
        })
    }
}

/// Discount Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct DiscountResponse {
    pub uuid: Uuid,

    /// Normalised upper-case code
    pub code: String,

    /// `percentage` or `fixed`
    pub kind: String,

    pub percentage: Option<String>,

    pub fixed_amount: Option<u64>,

    pub minimum_amount: Option<u64>,

    pub maximum_uses: Option<u32>,

    /// Redemptions so far
    pub current_uses: u32,

    pub is_active: bool,

    pub expires_at: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

impl From<DiscountRecord> for DiscountResponse {
    fn from(record: DiscountRecord) -> Self {
        let discount = record.discount;

        let (percentage, fixed_amount) = match discount.value {
            DiscountValue::Percentage(percent) => (Some(percent.normalize().to_string()), None),
            DiscountValue::Fixed(amount) => (None, Some(amount)),
        };

        Self {
            uuid: record.uuid.into_uuid(),
            kind: discount.value.kind().to_string(),
            code: discount.code,
            percentage,
            fixed_amount,
            minimum_amount: discount.minimum_amount,
            maximum_uses: discount.maximum_uses,
            current_uses: discount.current_uses,
            is_active: discount.is_active,
            expires_at: discount.expires_at.map(|at| at.to_string()),
            created_at: record.created_at.to_string(),
            updated_at: record.updated_at.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use testresult::TestResult;

    use super::*;

    fn request() -> DiscountRequest {
        DiscountRequest {
            code: "save10".to_string(),
            percentage: None,
            fixed_amount: None,
            minimum_amount: None,
            maximum_uses: None,
            is_active: true,
            expires_at: None,
        }
    }

    #[test]
    fn percentage_is_parsed_from_a_string() -> TestResult {
        let draft = DiscountRequest {
            percentage: Some("12.5".to_string()),
            ..request()
        }
        .into_draft()?;

        assert_eq!(draft.value, DiscountValue::Percentage(dec!(12.5)));

        Ok(())
    }

    #[test]
    fn both_values_are_rejected() {
        let result = DiscountRequest {
            percentage: Some("10".to_string()),
            fixed_amount: Some(500),
            ..request()
        }
        .into_draft();

        assert!(result.is_err(), "expected a bad request, got {result:?}");
    }

    #[test]
    fn missing_value_is_rejected() {
        assert!(request().into_draft().is_err(), "a value is required");
    }

    #[test]
    fn expiry_must_be_a_timestamp() {
        let result = DiscountRequest {
            fixed_amount: Some(500),
            expires_at: Some("next tuesday".to_string()),
            ..request()
        }
        .into_draft();

        assert!(result.is_err(), "expected a bad request, got {result:?}");
    }
}
