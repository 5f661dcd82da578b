//! Order Index Handler

use std::sync::Arc;

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    extensions::*,
    orders::{errors::into_status_error, models::OrderResponse},
    state::State,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct OrdersResponse {
    /// The signed-in user's orders, newest first
    pub orders: Vec<OrderResponse>,
}

/// Order Index Handler
#[endpoint(
    tags("orders"),
    summary = "List Orders",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<OrdersResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?.uuid;

    let orders = state
        .app
        .orders
        .list_orders(user)
        .await
        .map_err(into_status_error)?;

    Ok(Json(OrdersResponse {
        orders: orders.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use storefront::orders::OrderStatus;
    use testresult::TestResult;

    use storefront_app::domain::orders::records::OrderUuid;

    use crate::{
        orders::models::fixtures::make_order,
        test_helpers::{TEST_CUSTOMER_UUID, TestApp},
    };

    use super::*;

    #[tokio::test]
    async fn test_index_lists_the_users_orders() -> TestResult {
        let uuid = OrderUuid::new();

        let mut app = TestApp::default();

        app.orders
            .expect_list_orders()
            .once()
            .withf(|user| *user == TEST_CUSTOMER_UUID)
            .return_once(move |_| Ok(vec![make_order(uuid, OrderStatus::Completed)]));

        let response: OrdersResponse = TestClient::get("http://example.com/orders")
            .send(&app.customer_service(Router::with_path("orders").get(handler)))
            .await
            .take_json()
            .await?;

        let order = response.orders.first().ok_or("missing order")?;

        assert_eq!(order.uuid, uuid.into_uuid());
        assert_eq!(order.status, "completed");
        assert_eq!(order.currency, "USD");
        assert_eq!(order.asset.as_deref(), Some("bitcoin"));

        let line = order.items.first().ok_or("missing line")?;

        assert_eq!(line.line_total, 19_98);

        Ok(())
    }
}
