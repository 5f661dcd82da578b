//! Test helpers.

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{affix_state::inject, prelude::*};
use uuid::Uuid;

use storefront_app::{
    auth::{MockAuthService, User, UserRole, UserUuid},
    context::AppContext,
    domain::{
        discounts::MockDiscountsService, orders::MockOrdersService,
        products::MockProductsService,
    },
    notifications::MockMailer,
    payments::MockPaymentWatcher,
};

use crate::{extensions::*, state::State};

pub(crate) const TEST_CUSTOMER_UUID: UserUuid = UserUuid::from_uuid(Uuid::nil());

pub(crate) const TEST_ADMIN_UUID: UserUuid = UserUuid::from_uuid(Uuid::max());

pub(crate) fn test_customer() -> User {
    User {
        uuid: TEST_CUSTOMER_UUID,
        email: "buyer@example.com".to_string(),
        role: UserRole::Customer,
        created_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn test_admin() -> User {
    User {
        uuid: TEST_ADMIN_UUID,
        email: "admin@example.com".to_string(),
        role: UserRole::Admin,
        created_at: Timestamp::UNIX_EPOCH,
    }
}

#[salvo::handler]
pub(crate) async fn inject_customer(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    depot.insert_current_user(test_customer());
    ctrl.call_next(req, depot, res).await;
}

#[salvo::handler]
pub(crate) async fn inject_admin(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    depot.insert_current_user(test_admin());
    ctrl.call_next(req, depot, res).await;
}

/// Mocked services behind a test [`State`]. Unconfigured mocks fail any call made to them.
#[derive(Default)]
pub(crate) struct TestApp {
    pub(crate) products: MockProductsService,
    pub(crate) discounts: MockDiscountsService,
    pub(crate) orders: MockOrdersService,
    pub(crate) auth: MockAuthService,
    pub(crate) mailer: MockMailer,
    pub(crate) payments: MockPaymentWatcher,
}

impl TestApp {
    pub(crate) fn into_state(self) -> Arc<State> {
        State::from_app_context(AppContext {
            products: Arc::new(self.products),
            discounts: Arc::new(self.discounts),
            orders: Arc::new(self.orders),
            auth: Arc::new(self.auth),
            mailer: Arc::new(self.mailer),
            payments: Arc::new(self.payments),
        })
    }

    /// Serve `route` without a signed-in user.
    pub(crate) fn public_service(self, route: Router) -> Service {
        Service::new(Router::new().hoop(inject(self.into_state())).push(route))
    }

    /// Serve `route` as the test customer.
    pub(crate) fn customer_service(self, route: Router) -> Service {
        Service::new(
            Router::new()
                .hoop(inject(self.into_state()))
                .hoop(inject_customer)
                .push(route),
        )
    }

    /// Serve `route` as the test admin.
    pub(crate) fn admin_service(self, route: Router) -> Service {
        Service::new(
            Router::new()
                .hoop(inject(self.into_state()))
                .hoop(inject_admin)
                .push(route),
        )
    }
}

pub(crate) fn state_with_auth(auth: MockAuthService) -> Arc<State> {
    TestApp {
        auth,
        ..TestApp::default()
    }
    .into_state()
}
