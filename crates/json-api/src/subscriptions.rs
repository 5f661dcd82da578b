//! Subscriptions Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    extensions::*,
    orders::{errors::into_status_error, models::SubscriptionResponse},
    state::State,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct SubscriptionsResponse {
    /// Entitlements still in force, lifetime ones included
    pub subscriptions: Vec<SubscriptionResponse>,
}

/// Subscriptions Handler
#[endpoint(
    tags("subscriptions"),
    summary = "List Active Subscriptions",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    depot: &mut Depot,
) -> Result<Json<SubscriptionsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?.uuid;

    let subscriptions = state
        .app
        .orders
        .list_subscriptions(user, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    Ok(Json(SubscriptionsResponse {
        subscriptions: subscriptions.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use storefront::{orders::Entitlement, tiers::SubscriptionTier};
    use testresult::TestResult;

    use storefront_app::domain::{
        orders::{
            OrdersServiceError,
            records::{EntitlementRecord, EntitlementUuid, OrderUuid},
        },
        products::records::ProductUuid,
    };

    use crate::test_helpers::{TEST_CUSTOMER_UUID, TestApp};

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.customer_service(Router::with_path("subscriptions").get(handler))
    }

    #[tokio::test]
    async fn test_lists_active_subscriptions() -> TestResult {
        let product = ProductUuid::new();

        let mut app = TestApp::default();

        app.orders
            .expect_list_subscriptions()
            .once()
            .withf(|user, _| *user == TEST_CUSTOMER_UUID)
            .return_once(move |_, _| {
                Ok(vec![EntitlementRecord {
                    uuid: EntitlementUuid::new(),
                    user_uuid: TEST_CUSTOMER_UUID,
                    order_uuid: OrderUuid::new(),
                    product_uuid: product,
                    product_name: "Radar".to_string(),
                    product_slug: "radar".to_string(),
                    entitlement: Entitlement {
                        product_uuid: product.into_uuid(),
                        tier: SubscriptionTier::Lifetime,
                        starts_at: Timestamp::UNIX_EPOCH,
                        expires_at: None,
                    },
                    created_at: Timestamp::UNIX_EPOCH,
                }])
            });

        let response: SubscriptionsResponse = TestClient::get("http://example.com/subscriptions")
            .send(&make_service(app))
            .await
            .take_json()
            .await?;

        let subscription = response.subscriptions.first().ok_or("missing subscription")?;

        assert_eq!(subscription.product_slug, "radar");
        assert_eq!(subscription.tier, "lifetime");
        assert_eq!(subscription.expires_at, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_storage_failure_returns_500() -> TestResult {
        let mut app = TestApp::default();

        app.orders
            .expect_list_subscriptions()
            .once()
            .return_once(|_, _| Err(OrdersServiceError::Sql(sqlx::Error::PoolTimedOut)));

        let res = TestClient::get("http://example.com/subscriptions")
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));

        Ok(())
    }
}
