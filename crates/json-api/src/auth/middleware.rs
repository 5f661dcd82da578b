//! Auth middleware.

use std::sync::Arc;

use salvo::{http::header::AUTHORIZATION, prelude::*};

use storefront_app::auth::{AuthServiceError, User};

use crate::{extensions::*, state::State};

/// Resolves the bearer token to a user and stores it in the depot, or answers 401.
#[salvo::handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let outcome = authenticate(extract_bearer_token(req), depot).await;

    match outcome {
        Ok(user) => {
            depot.insert_current_user(user);

            ctrl.call_next(req, depot, res).await;
        }
        Err(rejection) => {
            res.render(rejection);
            ctrl.skip_rest();
        }
    }
}

async fn authenticate(token: Option<&str>, depot: &Depot) -> Result<User, StatusError> {
    let token = token.ok_or_else(|| {
        StatusError::unauthorized().brief("Missing or invalid Authorization header")
    })?;

    let state = depot.obtain_or_500::<Arc<State>>()?;

    state
        .app
        .auth
        .authenticate_bearer(token)
        .await
        .map_err(|error| match error {
            AuthServiceError::NotFound | AuthServiceError::InvalidEmail => {
                StatusError::unauthorized().brief("Invalid API token")
            }
            AuthServiceError::AlreadyExists | AuthServiceError::Sql(_) => {
                tracing::error!(%error, "bearer authentication failed");

                StatusError::internal_server_error()
            }
        })
}

fn extract_bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');

    let scheme = parts.next()?;
    let token = parts.next()?.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
