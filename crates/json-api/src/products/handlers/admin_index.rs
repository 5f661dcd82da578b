//! Admin Product Index Handler

use std::sync::Arc;

use salvo::{oapi::extract::QueryParam, prelude::*};

use crate::{extensions::*, products::index::ProductsResponse, state::State};

/// Admin Product Index Handler
///
/// Returns every product that has not been deleted, optionally including inactive ones.
#[endpoint(
    tags("admin"),
    summary = "List Products (admin)",
    security(("bearer_auth" = []))
)]
pub(crate) async fn handler(
    include_inactive: QueryParam<bool, false>,
    depot: &mut Depot,
) -> Result<Json<ProductsResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let products = state
        .app
        .products
        .list_products(include_inactive.into_inner().unwrap_or(true))
        .await
        .or_500("failed to fetch products")?;

    Ok(Json(ProductsResponse {
        products: products.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;
    use testresult::TestResult;

    use crate::test_helpers::TestApp;

    use super::*;

    fn make_service(app: TestApp) -> Service {
        app.admin_service(Router::with_path("admin/products").get(handler))
    }

    #[tokio::test]
    async fn test_admin_index_includes_inactive_by_default() -> TestResult {
        let mut app = TestApp::default();

        app.products
            .expect_list_products()
            .once()
            .withf(|include_inactive| *include_inactive)
            .return_once(|_| Ok(vec![]));

        let res = TestClient::get("http://example.com/admin/products")
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }

    #[tokio::test]
    async fn test_admin_index_forwards_include_inactive() -> TestResult {
        let mut app = TestApp::default();

        app.products
            .expect_list_products()
            .once()
            .withf(|include_inactive| !*include_inactive)
            .return_once(|_| Ok(vec![]));

        let res = TestClient::get("http://example.com/admin/products?include_inactive=false")
            .send(&make_service(app))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        Ok(())
    }
}
