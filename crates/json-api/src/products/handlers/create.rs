//! Create Product Handler

use std::sync::Arc;

use salvo::{
    http::header::LOCATION,
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_app::domain::products::{data::NewProduct, records::ProductUuid};

use crate::{
    extensions::*,
    products::{errors::into_status_error, get::ProductResponse},
    state::State,
};

use super::requests::ProductRequest;

/// Create Product Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CreateProductRequest {
    /// Client-chosen identifier; generated when omitted
    #[serde(default)]
    pub uuid: Option<Uuid>,

    #[serde(flatten)]
    pub product: ProductRequest,
}

impl CreateProductRequest {
    fn into_new_product(self) -> Result<NewProduct, StatusError> {
        let prices = self.product.tier_prices()?;

        Ok(NewProduct {
            uuid: self.uuid.map_or_else(ProductUuid::new, ProductUuid::from_uuid),
            name: self.product.name,
            slug: self.product.slug,
            description: self.product.description,
            image_url: self.product.image_url,
            prices,
            is_active: self.product.is_active,
        })
    }
}

/// Create Product Handler
#[endpoint(
    tags("admin"),
    summary = "Create Product",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Product created"),
        (status_code = StatusCode::CONFLICT, description = "Slug already in use"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<CreateProductRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<ProductResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let product = json.into_inner().into_new_product()?;

    let created = state
        .app
        .products
        .create_product(product)
        .await
        .map_err(into_status_error)?;

    res.add_header(LOCATION, format!("/products/{}", created.slug), true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::CREATED);

    Ok(Json(created.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use storefront::tiers::SubscriptionTier;
    use testresult::TestResult;

    use storefront_app::domain::products::ProductsServiceError;

    use crate::test_helpers::TestApp;

    use super::{super::tests::make_product, *};

    fn make_service(app: TestApp) -> Service {
        app.admin_service(Router::with_path("admin/products").post(handler))
    }

    fn body(uuid: ProductUuid) -> serde_json::Value {
        json!({
            "uuid": uuid.into_uuid(),
            "name": "Radar",
            "slug": "radar",
            "prices": [{ "tier": "weekly", "price": 999 }],
        })
    }

    #[tokio::test]
    async fn test_create_product_success() -> TestResult {
        let uuid = ProductUuid::new();
        let product = make_product(uuid, "radar");

        let mut app = TestApp::default();

        app.products
            .expect_create_product()
            .once()
            .withf(move |new| {
                new.uuid == uuid
                    && new.slug == "radar"
                    && new.is_active
                    && new.prices.first().map(|price| (price.tier, price.price))
                        == Some((SubscriptionTier::Weekly, 999))
            })
            .return_once(move |_| Ok(product));

        let mut res = TestClient::post("http://example.com/admin/products")
            .json(&body(uuid))
            .send(&make_service(app))
            .await;

        let body: ProductResponse = res.take_json().await?;
        let location = res.headers().get("location").and_then(|v| v.to_str().ok());

        assert_eq!(res.status_code, Some(StatusCode::CREATED));
        assert_eq!(location, Some("/products/radar"));
        assert_eq!(body.uuid, uuid.into_uuid());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_conflict_returns_409() -> TestResult {
        let mut app = TestApp::default();

        app.products
            .expect_create_product()
            .once()
            .return_once(|_| Err(ProductsServiceError::AlreadyExists));

        let res = TestClient::post("http://example.com/admin/products")
            .json(&body(ProductUuid::new()))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_unknown_tier_returns_400() -> TestResult {
        let mut app = TestApp::default();

        app.products.expect_create_product().never();

        let res = TestClient::post("http://example.com/admin/products")
            .json(&json!({
                "name": "Radar",
                "slug": "radar",
                "prices": [{ "tier": "fortnightly", "price": 999 }],
            }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
