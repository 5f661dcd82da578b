//! Order Errors

use salvo::http::StatusError;
use tracing::error;

use storefront::{orders::OrderError, pricing::PricingError};
use storefront_app::domain::orders::OrdersServiceError;

pub(crate) fn into_status_error(error: OrdersServiceError) -> StatusError {
    match error {
        OrdersServiceError::AlreadyExists => StatusError::conflict().brief("Order already exists"),
        OrdersServiceError::NotFound => StatusError::not_found().brief("Order not found"),
        OrdersServiceError::DiscountNotFound => {
            StatusError::unprocessable_entity().brief("Discount code not found")
        }
        OrdersServiceError::Pricing(PricingError::Discount(reason)) => {
            StatusError::unprocessable_entity().brief(reason.to_string())
        }
        OrdersServiceError::Pricing(reason) => StatusError::bad_request().brief(reason.to_string()),
        OrdersServiceError::Cart(reason) => StatusError::bad_request().brief(reason.to_string()),
        OrdersServiceError::WrongPaymentMethod(method) => {
            StatusError::conflict().brief(format!("Order was not paid with {method}"))
        }
        OrdersServiceError::Order(OrderError::InvalidTransition { from, .. }) => {
            StatusError::conflict().brief(format!("Order is {from}"))
        }
        OrdersServiceError::InvalidReference
        | OrdersServiceError::MissingRequiredData
        | OrdersServiceError::InvalidData => {
            StatusError::bad_request().brief("Invalid order payload")
        }
        OrdersServiceError::Invoice(source) => {
            error!("failed to create crypto invoice: {source}");

            StatusError::bad_gateway().brief("Payment provider unavailable")
        }
        OrdersServiceError::Order(source) => {
            error!("stored order is inconsistent: {source}");

            StatusError::internal_server_error()
        }
        OrdersServiceError::Sql(source) => {
            error!("order storage failed: {source}");

            StatusError::internal_server_error()
        }
    }
}
