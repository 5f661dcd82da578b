//! Delete Discount Handler

use std::sync::Arc;

use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

/// Delete Discount Handler
#[endpoint(
    tags("admin"),
    summary = "Delete Discount Code",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::NO_CONTENT, description = "Discount code deleted"),
        (status_code = StatusCode::NOT_FOUND, description = "Discount code not found"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
pub(crate) async fn handler(
    discount: PathParam<Uuid>,
    depot: &mut Depot,
) -> Result<StatusCode, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let discount = discount.into_inner();

    state
        .app
        .discounts
        .delete_discount(discount.into())
        .await
        .map_err(into_status_error)?;

    tracing::info!(discount_uuid = %discount, "deleted discount code");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use testresult::TestResult;

    use storefront_app::domain::discounts::{DiscountsServiceError, records::DiscountUuid};

    use crate::test_helpers::TestApp;

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.admin_service(Router::with_path("admin/discounts/{discount}").delete(handler))
    }

    #[tokio::test]
    async fn test_delete_discount_success() -> TestResult {
        let uuid = DiscountUuid::new();

        let mut app = TestApp::default();

        app.discounts
            .expect_delete_discount()
            .once()
            .withf(move |target| *target == uuid)
            .return_once(|_| Ok(()));

        let res = TestClient::delete(format!("http://example.com/admin/discounts/{uuid}"))
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::NO_CONTENT));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_discount_returns_404() -> TestResult {
        let mut app = TestApp::default();

        app.discounts
            .expect_delete_discount()
            .once()
            .return_once(|_| Err(DiscountsServiceError::NotFound));

        let res = TestClient::delete(format!(
            "http://example.com/admin/discounts/{}",
            DiscountUuid::new()
        ))
        .send(&make_service(app))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }
}
