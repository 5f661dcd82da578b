//! Orders service errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use storefront::{
    cart::CartError,
    discounts::DiscountError,
    orders::OrderError,
    pricing::PricingError,
};
use thiserror::Error;

use crate::payments::ChainClientError;

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("order already exists")]
    AlreadyExists,

    #[error("order not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("discount code not found")]
    DiscountNotFound,

    #[error("order was not paid with {0}")]
    WrongPaymentMethod(&'static str),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("crypto invoice could not be created")]
    Invoice(#[source] ChainClientError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<DiscountError> for OrdersServiceError {
    fn from(error: DiscountError) -> Self {
        Self::Pricing(PricingError::Discount(error))
    }
}

impl From<ChainClientError> for OrdersServiceError {
    fn from(error: ChainClientError) -> Self {
        Self::Invoice(error)
    }
}

impl From<Error> for OrdersServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            Some(ErrorKind::Other | _) | None => Self::Sql(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(
            matches!(
                OrdersServiceError::from(Error::RowNotFound),
                OrdersServiceError::NotFound
            ),
            "RowNotFound should map to NotFound"
        );
    }

    #[test]
    fn discount_rejections_surface_as_pricing_errors() {
        assert!(
            matches!(
                OrdersServiceError::from(DiscountError::Expired),
                OrdersServiceError::Pricing(PricingError::Discount(DiscountError::Expired))
            ),
            "discount rejections should be pricing errors"
        );
    }

    #[test]
    fn other_sql_errors_are_kept() {
        assert!(
            matches!(
                OrdersServiceError::from(Error::PoolTimedOut),
                OrdersServiceError::Sql(Error::PoolTimedOut)
            ),
            "pool errors should stay storage errors"
        );
    }
}
