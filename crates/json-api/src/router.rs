//! App Router

use salvo::Router;

use crate::{auth, cart, discounts, orders, products, subscriptions};

/// Every API route below the healthcheck.
///
/// Catalogue browsing, cart quotes and code checks are anonymous. Orders and subscriptions need a
/// bearer token, and everything under `admin` also needs the admin role.
pub fn app_router() -> Router {
    Router::new()
        .push(public_router())
        .push(
            Router::new()
                .hoop(auth::middleware::handler)
                .push(customer_router())
                .push(admin_router()),
        )
}

fn public_router() -> Router {
    Router::new()
        .push(
            Router::with_path("products")
                .get(products::index::handler)
                .push(Router::with_path("{slug}").get(products::get::handler)),
        )
        .push(Router::with_path("cart/quote").post(cart::quote::handler))
        .push(Router::with_path("discounts/validate").post(discounts::validate::handler))
}

fn customer_router() -> Router {
    Router::new()
        .push(
            Router::with_path("orders")
                .get(orders::index::handler)
                .post(orders::create::handler)
                .push(
                    Router::with_path("{order}")
                        .get(orders::get::handler)
                        .push(Router::with_path("cancel").post(orders::cancel::handler))
                        .push(Router::with_path("payment").get(orders::payment::handler)),
                ),
        )
        .push(Router::with_path("subscriptions").get(subscriptions::handler))
}

fn admin_router() -> Router {
    Router::with_path("admin")
        .hoop(auth::admin::handler)
        .push(
            Router::with_path("products")
                .get(products::admin_index::handler)
                .post(products::create::handler)
                .push(
                    Router::with_path("{product}")
                        .put(products::update::handler)
                        .delete(products::delete::handler),
                ),
        )
        .push(
            Router::with_path("discounts")
                .get(discounts::index::handler)
                .post(discounts::create::handler)
                .push(
                    Router::with_path("{discount}")
                        .get(discounts::get::handler)
                        .put(discounts::update::handler)
                        .delete(discounts::delete::handler),
                ),
        )
        .push(
            Router::with_path("orders/{order}/card-payment")
                .post(orders::card_payment::handler),
        )
}
