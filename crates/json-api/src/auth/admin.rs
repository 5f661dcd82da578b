//! Admin guard.

use salvo::prelude::*;

use crate::extensions::*;

/// Rejects requests from users without the admin role.
#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    match depot.current_user_or_401() {
        Ok(user) if user.is_admin() => {}
        Ok(user) => {
            tracing::warn!(user = %user.uuid, "admin route refused");

            res.render(StatusError::forbidden().brief("Admin access required"));
            ctrl.skip_rest();

            return;
        }
        Err(error) => {
            res.render(error);
            ctrl.skip_rest();

            return;
        }
    }

    ctrl.call_next(req, depot, res).await;
}
