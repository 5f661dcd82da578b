//! Checkout Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    http::header::LOCATION,
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use storefront::{email::EmailTemplate, orders::PaymentMethod};
use storefront_app::{domain::orders::data::CheckoutRequest, notifications::deliver};

use crate::{
    extensions::*,
    orders::{
        errors::into_status_error,
        models::{LineRequest, OrderResponse, PaymentResponse, checkout_items},
    },
    state::State,
};

/// Checkout Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CreateOrderRequest {
    pub items: Vec<LineRequest>,

    #[serde(default)]
    pub discount_code: Option<String>,

    /// `card` or `crypto`
    pub payment_method: String,

    /// Required for crypto: `bitcoin`, `ethereum` or `litecoin`
    #[serde(default)]
    pub asset: Option<String>,
}

impl CreateOrderRequest {
    fn into_checkout(self) -> Result<CheckoutRequest, StatusError> {
        let payment_method = PaymentMethod::from_parts(&self.payment_method, self.asset.as_deref())
            .or_400("Unknown payment method")?;

        Ok(CheckoutRequest {
            items: checkout_items(self.items)?,
            discount_code: self
                .discount_code
                .filter(|code| !code.trim().is_empty()),
            payment_method,
        })
    }
}

/// Checkout Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CheckoutResponse {
    pub order: OrderResponse,

    /// Payment instructions; crypto orders carry the deposit address
    pub payment: PaymentResponse,
}

/// Checkout Handler
///
/// Prices the lines at catalogue prices, redeems the discount code and places the order.
/// Crypto orders are watched until their payment settles.
#[endpoint(
    tags("orders"),
    summary = "Place Order",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::CREATED, description = "Order placed"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::UNPROCESSABLE_ENTITY, description = "Discount code rejected"),
        (status_code = StatusCode::BAD_GATEWAY, description = "Payment provider unavailable"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
#[tracing::instrument(
    name = "orders.create",
    skip(json, depot, res),
    fields(user_uuid = tracing::field::Empty, order_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    json: JsonBody<CreateOrderRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<Json<CheckoutResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?.uuid;
    let request = json.into_inner().into_checkout()?;

    let span = tracing::Span::current();

    span.record("user_uuid", tracing::field::display(user));

    let outcome = state
        .app
        .orders
        .checkout(user, request, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    span.record("order_uuid", tracing::field::display(outcome.order.uuid));

    if let Some(watched) = outcome.watchable() {
        state
            .app
            .payments
            .watch(watched.order, watched.request, watched.progress);
    }

    deliver(
        state.app.mailer.as_ref(),
        EmailTemplate::OrderConfirmation(outcome.order.summary()),
    )
    .await;

    res.add_header(LOCATION, format!("/orders/{}", outcome.order.uuid), true)
        .or_500("failed to set location header")?
        .status_code(StatusCode::CREATED);

    tracing::info!(
        status = outcome.order.status.as_str(),
        total = outcome.order.total,
        "order placed"
    );

    Ok(Json(CheckoutResponse {
        order: outcome.order.into(),
        payment: outcome.payment.into(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use storefront::{
        discounts::DiscountError,
        orders::{CryptoAsset, OrderStatus},
        pricing::PricingError,
    };
    use testresult::TestResult;

    use storefront_app::domain::orders::{
        OrdersServiceError, data::CheckoutOutcome, records::OrderUuid,
    };

    use crate::{
        orders::models::fixtures::{make_order, make_payment},
        test_helpers::{TEST_CUSTOMER_UUID, TestApp},
    };

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.customer_service(Router::with_path("orders").post(handler))
    }

    fn crypto_body() -> serde_json::Value {
        json!({
            "items": [{
                "product_uuid": "01890a5d-ac96-774b-bcce-b302099a8057",
                "tier": "weekly",
                "quantity": 2,
            }],
            "discount_code": "spring15",
            "payment_method": "crypto",
            "asset": "btc",
        })
    }

    #[tokio::test]
    async fn test_crypto_checkout_starts_watching_and_emails() -> TestResult {
        let uuid = OrderUuid::new();
        let outcome = CheckoutOutcome {
            order: make_order(uuid, OrderStatus::Pending),
            payment: make_payment(uuid),
        };

        let mut app = TestApp::default();

        app.orders
            .expect_checkout()
            .once()
            .withf(|user, request, _| {
                *user == TEST_CUSTOMER_UUID
                    && request.payment_method == PaymentMethod::Crypto(CryptoAsset::Bitcoin)
                    && request.discount_code.as_deref() == Some("spring15")
                    && request.items.len() == 1
            })
            .return_once(move |_, _, _| Ok(outcome));

        app.payments
            .expect_watch()
            .once()
            .withf(move |order, request, _| *order == uuid && request.address == "bc1qexample")
            .return_const(());

        app.mailer
            .expect_send()
            .once()
            .withf(|message| message.to == "buyer@example.com")
            .return_once(|_| Ok(()));

        let mut res = TestClient::post("http://example.com/orders")
            .json(&crypto_body())
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CREATED));

        let body: CheckoutResponse = res.take_json().await?;

        assert_eq!(body.order.uuid, uuid.into_uuid());
        assert_eq!(body.payment.address.as_deref(), Some("bc1qexample"));

        Ok(())
    }

    #[tokio::test]
    async fn test_completed_order_is_not_watched() -> TestResult {
        let uuid = OrderUuid::new();
        let outcome = CheckoutOutcome {
            order: make_order(uuid, OrderStatus::Completed),
            payment: make_payment(uuid),
        };

        let mut app = TestApp::default();

        app.orders
            .expect_checkout()
            .once()
            .return_once(move |_, _, _| Ok(outcome));

        app.payments.expect_watch().never();

        app.mailer.expect_send().once().return_once(|_| Ok(()));

        let res = TestClient::post("http://example.com/orders")
            .json(&crypto_body())
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CREATED));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_payment_method_returns_400() -> TestResult {
        let mut app = TestApp::default();

        app.orders.expect_checkout().never();

        let res = TestClient::post("http://example.com/orders")
            .json(&json!({ "items": [], "payment_method": "cheque" }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_discount_returns_422() -> TestResult {
        let mut app = TestApp::default();

        app.orders.expect_checkout().once().return_once(|_, _, _| {
            Err(OrdersServiceError::Pricing(PricingError::Discount(
                DiscountError::UsageLimitReached,
            )))
        });

        app.payments.expect_watch().never();
        app.mailer.expect_send().never();

        let res = TestClient::post("http://example.com/orders")
            .json(&crypto_body())
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNPROCESSABLE_ENTITY));

        Ok(())
    }

    #[tokio::test]
    async fn test_anonymous_checkout_returns_401() -> TestResult {
        let mut app = TestApp::default();

        app.orders.expect_checkout().never();

        let res = TestClient::post("http://example.com/orders")
            .json(&crypto_body())
            .send(&app.public_service(Router::with_path("orders").post(handler)))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }
}
