//! Discount Errors

use salvo::http::StatusError;
use tracing::error;

use storefront_app::domain::discounts::DiscountsServiceError;

pub(crate) fn into_status_error(error: DiscountsServiceError) -> StatusError {
    match error {
        DiscountsServiceError::AlreadyExists => {
            StatusError::conflict().brief("Discount code already exists")
        }
        DiscountsServiceError::NotFound => {
            StatusError::not_found().brief("Discount code not found")
        }
        DiscountsServiceError::UnknownCode => {
            StatusError::unprocessable_entity().brief("Discount code not found")
        }
        DiscountsServiceError::Invalid(reason) => {
            StatusError::bad_request().brief(reason.to_string())
        }
        DiscountsServiceError::Rejected(reason) => {
            StatusError::unprocessable_entity().brief(reason.to_string())
        }
        DiscountsServiceError::InvalidReference
        | DiscountsServiceError::MissingRequiredData
        | DiscountsServiceError::InvalidData => {
            StatusError::bad_request().brief("Invalid discount payload")
        }
        DiscountsServiceError::Sql(source) => {
            error!("discount storage failed: {source}");

            StatusError::internal_server_error()
        }
    }
}
