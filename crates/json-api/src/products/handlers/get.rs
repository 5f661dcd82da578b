//! Get Product Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_app::domain::products::records::ProductRecord;

use crate::{extensions::*, products::errors::into_status_error, state::State};

/// Tier Price Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TierPriceResponse {
    /// Tier slug
    pub tier: String,

    /// Human readable tier name
    pub label: String,

    /// Price in minor units
    pub price: u64,
}

/// Product Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ProductResponse {
    /// The unique identifier of the product
    pub uuid: Uuid,

    pub name: String,

    /// URL-safe product identifier
    pub slug: String,

    pub description: String,

    pub image_url: Option<String>,

    /// Prices per subscription tier, shortest tier first
    pub prices: Vec<TierPriceResponse>,

    /// Whether the product can be bought
    pub is_active: bool,

    /// The date and time the product was created
    pub created_at: String,

    /// The date and time the product was last updated
    pub updated_at: String,
}

impl From<ProductRecord> for ProductResponse {
    fn from(product: ProductRecord) -> Self {
        let mut prices = product.prices.into_vec();

        prices.sort_by_key(|price| price.tier);

        ProductResponse {
            uuid: product.uuid.into_uuid(),
            name: product.name,
            slug: product.slug,
            description: product.description,
            image_url: product.image_url,
            prices: prices
                .into_iter()
                .map(|price| TierPriceResponse {
                    tier: price.tier.as_str().to_string(),
                    label: price.tier.label().to_string(),
                    price: price.price,
                })
                .collect(),
            is_active: product.is_active,
            created_at: product.created_at.to_string(),
            updated_at: product.updated_at.to_string(),
        }
    }
}

/// Get Product Handler
///
/// Returns an active product by slug.
#[endpoint(
    tags("products"),
    summary = "Get Product",
    responses(
        (status_code = StatusCode::OK, description = "Product found"),
        (status_code = StatusCode::NOT_FOUND, description = "Product not found"),
    ),
)]
pub(crate) async fn handler(
    slug: PathParam<String>,
    depot: &mut Depot,
) -> Result<Json<ProductResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let product = state
        .app
        .products
        .get_product_by_slug(&slug.into_inner())
        .await
        .map_err(into_status_error)?;

    Ok(Json(product.into()))
}
