//! Cart Quote Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use storefront::pricing::Quote;

use crate::{
    extensions::*,
    orders::{
        errors::into_status_error,
        models::{LineRequest, OrderDiscountResponse, checkout_items},
    },
    state::State,
};

/// Quote Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct QuoteRequest {
    pub items: Vec<LineRequest>,

    #[serde(default)]
    pub discount_code: Option<String>,
}

/// Quote Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct QuoteResponse {
    pub subtotal: u64,
    pub discount: Option<OrderDiscountResponse>,
    pub total: u64,

    /// Units across all lines
    pub item_count: u64,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            subtotal: quote.subtotal,
            discount: quote.discount.map(|discount| OrderDiscountResponse {
                code: discount.code,
                amount: discount.amount,
            }),
            total: quote.total,
            item_count: quote.item_count,
        }
    }
}

/// Cart Quote Handler
///
/// Prices cart lines at catalogue prices. Nothing is reserved or redeemed.
#[endpoint(
    tags("cart"),
    summary = "Quote Cart",
    responses(
        (status_code = StatusCode::OK, description = "Cart priced"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::UNPROCESSABLE_ENTITY, description = "Discount code rejected"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<QuoteRequest>,
    depot: &mut Depot,
) -> Result<Json<QuoteResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let request = json.into_inner();

    let quote = state
        .app
        .orders
        .quote(
            checkout_items(request.items)?,
            request.discount_code.filter(|code| !code.trim().is_empty()),
            Timestamp::now(),
        )
        .await
        .map_err(into_status_error)?;

    Ok(Json(quote.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use storefront::{
        discounts::{AppliedDiscount, DiscountError},
        pricing::PricingError,
        tiers::SubscriptionTier,
    };
    use testresult::TestResult;
    use uuid::Uuid;

    use storefront_app::domain::orders::OrdersServiceError;

    use crate::test_helpers::TestApp;

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.public_service(Router::with_path("cart/quote").post(handler))
    }

    #[tokio::test]
    async fn test_quote_applies_discount() -> TestResult {
        let product = Uuid::now_v7();

        let mut app = TestApp::default();

        app.orders
            .expect_quote()
            .once()
            .withf(move |items, code, _| {
                code.as_deref() == Some("save10")
                    && items.first().is_some_and(|item| {
                        item.product_uuid.into_uuid() == product
                            && item.tier == SubscriptionTier::Monthly
                            && item.quantity == 2
                    })
            })
            .return_once(|_, _, _| {
                Ok(Quote {
                    subtotal: 50_00,
                    discount: Some(AppliedDiscount {
                        code: "SAVE10".to_string(),
                        amount: 10_00,
                        total: 40_00,
                    }),
                    total: 40_00,
                    item_count: 2,
                })
            });

        let response: QuoteResponse = TestClient::post("http://example.com/cart/quote")
            .json(&json!({
                "items": [{ "product_uuid": product, "tier": "monthly", "quantity": 2 }],
                "discount_code": "save10",
            }))
            .send(&make_service(app))
            .await
            .take_json()
            .await?;

        assert_eq!(response.subtotal, 50_00);
        assert_eq!(response.total, 40_00);
        assert_eq!(response.item_count, 2);
        assert_eq!(
            response.discount.map(|discount| discount.code),
            Some("SAVE10".to_string())
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_blank_code_is_ignored() -> TestResult {
        let mut app = TestApp::default();

        app.orders
            .expect_quote()
            .once()
            .withf(|_, code, _| code.is_none())
            .return_once(|_, _, _| {
                Ok(Quote {
                    subtotal: 9_99,
                    discount: None,
                    total: 9_99,
                    item_count: 1,
                })
            });

        let res = TestClient::post("http://example.com/cart/quote")
            .json(&json!({
                "items": [{ "product_uuid": Uuid::now_v7(), "tier": "weekly", "quantity": 1 }],
                "discount_code": "  ",
            }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tier_returns_400() -> TestResult {
        let mut app = TestApp::default();

        app.orders.expect_quote().never();

        let res = TestClient::post("http://example.com/cart/quote")
            .json(&json!({
                "items": [{ "product_uuid": Uuid::now_v7(), "tier": "fortnightly", "quantity": 1 }],
            }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }

    #[tokio::test]
    async fn test_expired_code_returns_422() -> TestResult {
        let mut app = TestApp::default();

        app.orders.expect_quote().once().return_once(|_, _, _| {
            Err(OrdersServiceError::Pricing(PricingError::Discount(
                DiscountError::Expired,
            )))
        });

        let res = TestClient::post("http://example.com/cart/quote")
            .json(&json!({
                "items": [{ "product_uuid": Uuid::now_v7(), "tier": "weekly", "quantity": 1 }],
                "discount_code": "OLD",
            }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNPROCESSABLE_ENTITY));

        Ok(())
    }
}
