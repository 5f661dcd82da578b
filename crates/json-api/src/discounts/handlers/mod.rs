//! Discount Handlers

pub(crate) mod create;
pub(crate) mod delete;
pub(crate) mod get;
pub(crate) mod index;
pub(crate) mod update;
pub(crate) mod validate;

mod models;

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::dec;
    use storefront::discounts::{DiscountCode, DiscountValue};

    use storefront_app::domain::discounts::records::{DiscountRecord, DiscountUuid};

    pub(super) fn make_discount(uuid: DiscountUuid, code: &str) -> DiscountRecord {
        DiscountRecord {
            uuid,
            discount: DiscountCode {
                code: code.to_string(),
                value: DiscountValue::Percentage(dec!(15)),
                minimum_amount: None,
                maximum_uses: Some(100),
                current_uses: 3,
                is_active: true,
                expires_at: None,
            },
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }
}
