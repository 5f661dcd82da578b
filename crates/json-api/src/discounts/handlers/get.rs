//! Get Discount Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

use super::models::DiscountResponse;

/// Get Discount Handler
#[endpoint(
    tags("admin"),
    summary = "Get Discount Code",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Discount code found"),
        (status_code = StatusCode::NOT_FOUND, description = "Discount code not found"),
    ),
)]
pub(crate) async fn handler(
    discount: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<Json<DiscountResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let discount = state
        .app
        .discounts
        .get_discount(discount.into_inner().into())
        .await
        .map_err(into_status_error)?;

    Ok(Json(discount.into()))
}
