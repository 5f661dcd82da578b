//! Validate Discount Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    oapi::{ToSchema, extract::JsonBody},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use storefront::discounts::AppliedDiscount;

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

/// Validate Discount Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ValidateDiscountRequest {
    /// Code as typed by the customer
    pub code: String,

    /// Cart subtotal in minor units
    pub order_amount: u64,
}

/// Validate Discount Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ValidateDiscountResponse {
    /// Normalised code
    pub code: String,

    /// Amount taken off, in minor units
    pub amount: u64,

    /// Order amount after the discount, in minor units
    pub total: u64,
}

impl From<AppliedDiscount> for ValidateDiscountResponse {
    fn from(applied: AppliedDiscount) -> Self {
        Self {
            code: applied.code,
            amount: applied.amount,
            total: applied.total,
        }
    }
}

/// Validate Discount Handler
///
/// Checks a code against an order amount without redeeming it.
#[endpoint(
    tags("discounts"),
    summary = "Validate Discount Code",
    responses(
        (status_code = StatusCode::OK, description = "Code applies"),
        (status_code = StatusCode::UNPROCESSABLE_ENTITY, description = "Unknown code, or code rejected for this order"),
    ),
)]
pub(crate) async fn handler(
    json: JsonBody<ValidateDiscountRequest>,
    depot: &mut Depot,
) -> Result<Json<ValidateDiscountResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let request = json.into_inner();

    let applied = state
        .app
        .discounts
        .validate_code(&request.code, request.order_amount, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    Ok(Json(applied.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::json;
    use storefront::discounts::DiscountError;
    use testresult::TestResult;

    use storefront_app::domain::discounts::DiscountsServiceError;

    use crate::test_helpers::TestApp;

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.public_service(Router::with_path("discounts/validate").post(handler))
    }

    #[tokio::test]
    async fn test_validate_returns_discounted_total() -> TestResult {
        let mut app = TestApp::default();

        app.discounts
            .expect_validate_code()
            .once()
            .withf(|code, amount, _| code == "spring15" && *amount == 20_00)
            .return_once(|_, _, _| {
                Ok(AppliedDiscount {
                    code: "SPRING15".to_string(),
                    amount: 3_00,
                    total: 17_00,
                })
            });

        let response: ValidateDiscountResponse =
            TestClient::post("http://example.com/discounts/validate")
                .json(&json!({ "code": "spring15", "order_amount": 2000 }))
                .send(&make_service(app))
                .await
                .take_json()
                .await?;

        assert_eq!(response.code, "SPRING15");
        assert_eq!(response.amount, 3_00);
        assert_eq!(response.total, 17_00);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_code_returns_422() -> TestResult {
        let mut app = TestApp::default();

        app.discounts
            .expect_validate_code()
            .once()
            .return_once(|_, _, _| Err(DiscountsServiceError::UnknownCode));

        let res = TestClient::post("http://example.com/discounts/validate")
            .json(&json!({ "code": "nope", "order_amount": 2000 }))
            .send(&make_service(app))
            .await;

        assert_eq!(
            res.status_code,
            Some(StatusCode::UNPROCESSABLE_ENTITY),
            "unknown codes answer like rejected ones, as at checkout"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_code_returns_422() -> TestResult {
        let mut app = TestApp::default();

        app.discounts
            .expect_validate_code()
            .once()
            .return_once(|_, _, _| Err(DiscountsServiceError::Rejected(DiscountError::Expired)));

        let res = TestClient::post("http://example.com/discounts/validate")
            .json(&json!({ "code": "OLD", "order_amount": 2000 }))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::UNPROCESSABLE_ENTITY));

        Ok(())
    }
}
