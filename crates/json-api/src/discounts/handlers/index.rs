//! Discount Index Handler

use std::sync::Arc;

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{discounts::errors::into_status_error, extensions::*, state::State};

use super::models::DiscountResponse;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct DiscountsResponse {
    /// Every discount code, newest first
    pub discounts: Vec<DiscountResponse>,
}

/// Discount Index Handler
#[endpoint(
    tags("admin"),
    summary = "List Discount Codes",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<DiscountsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let discounts = state
        .app
        .discounts
        .list_discounts()
        .await
        .map_err(into_status_error)?;

    Ok(Json(DiscountsResponse {
        discounts: discounts.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use storefront_app::domain::discounts::records::DiscountUuid;

    use crate::test_helpers::TestApp;

    use super::{super::tests::make_discount, *};

    #[tokio::test]
    async fn test_index_returns_discounts() -> TestResult {
        let uuid = DiscountUuid::new();

        let mut app = TestApp::default();

        app.discounts
            .expect_list_discounts()
            .once()
            .return_once(move || Ok(vec![make_discount(uuid, "SPRING15")]));

        let response: DiscountsResponse = TestClient::get("http://example.com/admin/discounts")
            .send(&app.admin_service(Router::with_path("admin/discounts").get(handler)))
            .await
            .take_json()
            .await?;

        let discount = response.discounts.first().ok_or("missing discount")?;

        assert_eq!(discount.uuid, uuid.into_uuid());
        assert_eq!(discount.kind, "percentage");
        assert_eq!(discount.percentage.as_deref(), Some("15"));
        assert_eq!(discount.current_uses, 3);

        Ok(())
    }
}
