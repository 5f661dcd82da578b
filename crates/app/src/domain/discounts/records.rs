//! Discount Records

use jiff::Timestamp;
use storefront::discounts::DiscountCode;

use crate::uuids::TypedUuid;

/// Discount UUID
pub type DiscountUuid = TypedUuid<DiscountRecord>;

/// Discount Record
#[derive(Debug, Clone)]
pub struct DiscountRecord {
    pub uuid: DiscountUuid,
    pub discount: DiscountCode,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
