//! Card Payment Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    oapi::{
        ToSchema,
        extract::{JsonBody, PathParam},
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_app::{
    domain::orders::data::CardPaymentOutcome,
    notifications::{deliver, settlement_template},
};

use crate::{
    extensions::*,
    orders::{errors::into_status_error, models::OrderResponse},
    state::State,
};

/// Card processor verdict
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CardPaymentRequest {
    /// `succeeded` or `declined`
    pub outcome: String,

    /// Processor reference, required when the payment succeeded
    #[serde(default)]
    pub reference: Option<String>,

    /// Decline reason shown to the customer
    #[serde(default)]
    pub reason: Option<String>,
}

impl CardPaymentRequest {
    fn into_outcome(self) -> Result<CardPaymentOutcome, StatusError> {
        match self.outcome.as_str() {
            "succeeded" => {
                let reference = self
                    .reference
                    .filter(|reference| !reference.trim().is_empty())
                    .ok_or_else(|| {
                        StatusError::bad_request().brief("A successful payment needs a reference")
                    })?;

                Ok(CardPaymentOutcome::Succeeded { reference })
            }
            "declined" => Ok(CardPaymentOutcome::Declined {
                reason: self
                    .reason
                    .map(|reason| reason.trim().trim_end_matches('.').to_lowercase())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| "the card was declined".to_string()),
            }),
            _ => Err(StatusError::bad_request().brief("Unknown card payment outcome")),
        }
    }
}

/// Card Payment Handler
///
/// Records the card processor's verdict for an order and settles it.
#[endpoint(
    tags("orders"),
    summary = "Record Card Payment",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Payment recorded"),
        (status_code = StatusCode::BAD_REQUEST, description = "Bad Request"),
        (status_code = StatusCode::NOT_FOUND, description = "Order not found"),
        (status_code = StatusCode::CONFLICT, description = "Order is not paid by card"),
    ),
)]
#[tracing::instrument(
    name = "orders.card_payment",
    skip(order, json, depot),
    fields(order_uuid = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    order: PathParam<Uuid>,
    json: JsonBody<CardPaymentRequest>,
    depot: &mut Depot,
) -> Result<Json<OrderResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let order = order.into_inner();

    tracing::Span::current().record("order_uuid", tracing::field::display(order));

    let outcome = json.into_inner().into_outcome()?;

    let reason = match &outcome {
        CardPaymentOutcome::Declined { reason } => reason.clone(),
        CardPaymentOutcome::Succeeded { .. } => String::new(),
    };

    let update = state
        .app
        .orders
        .record_card_payment(order.into(), outcome, Timestamp::now())
        .await
        .map_err(into_status_error)?;

    if let Some(template) = settlement_template(&update, &reason) {
        deliver(state.app.mailer.as_ref(), template).await;
    }

    Ok(Json(update.order.into()))
}
