//! Update Discount Handler

use std::sync::Arc;

use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use uuid::Uuid;

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

use super::models::{DiscountRequest, DiscountResponse};

/// Update Discount Handler
///
/// Replaces a code's settings. The usage count is kept.
#[endpoint(
    tags("admin"),
    summary = "Update Discount Code",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Discount code updated"),
        (status_code = StatusCode::NOT_FOUND, description = "Discount code not found"),
        (status_code = StatusCode::CONFLICT, description = "Code already exists"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
#[tracing::instrument(
    name = "discounts.update",
    skip(discount, json, depot),
    fields(discount_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    discount: PathParam<Uuid>,
    json: JsonBody<DiscountRequest>,
    depot: &mut Depot,
) -> Result<Json<DiscountResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let discount = discount.into_inner();
    let draft = json.into_inner().into_draft()?;

    tracing::Span::current().record("discount_uuid", tracing::field::display(discount));

    let updated = state
        .app
        .discounts
        .update_discount(discount.into(), draft)
        .await
        .map_err(into_status_error)?;

    Ok(Json(updated.into()))
}
