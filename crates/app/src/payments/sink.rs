//! Order-backed payment progress sink.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use storefront::payments::PaymentProgress;
use thiserror::Error;

use crate::{
    domain::orders::{OrdersService, OrdersServiceError, records::OrderUuid},
    notifications::{Mailer, deliver, settlement_template},
    payments::PaymentProgressSink,
};

#[derive(Debug, Error)]
pub enum PaymentSinkError {
    #[error("failed to record payment progress")]
    Orders(#[source] OrdersServiceError),
}

impl From<OrdersServiceError> for PaymentSinkError {
    fn from(error: OrdersServiceError) -> Self {
        Self::Orders(error)
    }
}

/// Writes payment progress to the order and emails the customer once it settles.
#[derive(Clone)]
pub struct OrderPaymentSink {
    orders: Arc<dyn OrdersService>,
    mailer: Arc<dyn Mailer>,
}

impl fmt::Debug for OrderPaymentSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderPaymentSink").finish_non_exhaustive()
    }
}

impl OrderPaymentSink {
    #[must_use]
    pub fn new(orders: Arc<dyn OrdersService>, mailer: Arc<dyn Mailer>) -> Self {
        Self { orders, mailer }
    }
}

fn failure_reason(progress: &PaymentProgress) -> String {
    match progress {
        PaymentProgress::Underpaid { received, .. } => {
            format!("the payment received ({received}) was less than the amount due")
        }
        PaymentProgress::Expired => "no payment arrived before the deadline".to_string(),
        PaymentProgress::AwaitingTransaction
        | PaymentProgress::Confirming { .. }
        | PaymentProgress::Confirmed { .. } => "the payment could not be completed".to_string(),
    }
}

#[async_trait]
impl PaymentProgressSink for OrderPaymentSink {
    async fn record(
        &self,
        order: OrderUuid,
        progress: &PaymentProgress,
    ) -> Result<(), PaymentSinkError> {
        let update = self
            .orders
            .record_payment_progress(order, progress.clone(), Timestamp::now())
            .await?;

        if let Some(template) = settlement_template(&update, &failure_reason(progress)) {
            deliver(self.mailer.as_ref(), template).await;
        }

        Ok(())
    }
}
