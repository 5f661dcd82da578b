//! Update Product Handler

use std::sync::Arc;

use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use uuid::Uuid;

use storefront_app::domain::products::data::ProductUpdate;

use crate::{
    extensions::*,
    products::{errors::into_status_error, get::ProductResponse},
    state::State,
};

use super::requests::ProductRequest;

impl ProductRequest {
    fn into_update(self) -> Result<ProductUpdate, StatusError> {
        let prices = self.tier_prices()?;

        Ok(ProductUpdate {
            name: self.name,
            slug: self.slug,
            description: self.description,
            image_url: self.image_url,
            prices,
            is_active: self.is_active,
        })
    }
}

/// Product Update Handler
///
/// Replaces a product's details and tier prices.
#[endpoint(
    tags("admin"),
    summary = "Update Product",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Product updated"),
        (status_code = StatusCode::NOT_FOUND, description = "Product not found"),
        (status_code = StatusCode::CONFLICT, description = "Slug already in use"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
#[tracing::instrument(
    name = "products.update",
    skip(product, json, depot),
    fields(product_uuid = tracing::field::Empty, prices = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    product: PathParam<Uuid>,
    json: JsonBody<ProductRequest>,
    depot: &mut Depot,
) -> Result<Json<ProductResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let product = product.into_inner();
    let update = json.into_inner().into_update()?;

    let span = tracing::Span::current();

    span.record("product_uuid", tracing::field::display(product));
    span.record("prices", tracing::field::display(update.prices.len()));

    let updated = state
        .app
        .products
        .update_product(product.into(), update)
        .await
        .map_err(into_status_error)?;

    tracing::info!(product_uuid = %product, slug = %updated.slug, "updated product");

    Ok(Json(updated.into()))
}
