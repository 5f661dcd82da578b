//! Create Discount Handler

use std::sync::Arc;

use salvo::{http::header::LOCATION, oapi::extract::JsonBody, prelude::*};

use storefront_app::domain::discounts::records::DiscountUuid;

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

use super::models::{DiscountRequest, DiscountResponse};

/// Create Discount Handler
#[endpoint(
    tags("admin"),
    summary = "Create Discount Code",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Discount code created"),
        (status_code = StatusCode::CONFLICT, description = "Code already exists"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<DiscountRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<DiscountResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let draft = json.into_inner().into_draft()?;

    let created = state
        .app
        .discounts
        .create_discount(DiscountUuid::new(), draft)
        .await
        .map_err(into_status_error)?;

    res.add_header(LOCATION, format!("/admin/discounts/{}", created.uuid), true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::CREATED);

    Ok(Json(created.into()))
}
