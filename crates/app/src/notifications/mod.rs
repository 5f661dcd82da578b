//! Transactional email delivery.

use async_trait::async_trait;
use mockall::automock;
use storefront::{
    email::{EmailMessage, EmailTemplate},
    orders::OrderStatus,
};
use thiserror::Error;

use crate::domain::orders::data::PaymentUpdate;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("message could not be rendered")]
    Render(#[from] storefront::email::EmailError),

    #[error("message was rejected: {0}")]
    Rejected(String),
}

/// Sends rendered messages.
#[automock]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError>;
}

/// Mailer that writes each message to the log instead of sending it.
#[derive(Debug, Clone)]
pub struct TracingMailer {
    from: String,
}

impl TracingMailer {
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        if message.to.trim().is_empty() {
            return Err(MailerError::Rejected("missing recipient".to_string()));
        }

        tracing::info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "email sent"
        );

        Ok(())
    }
}

/// Email owed to the customer after a payment moved their order, if any.
#[must_use]
pub fn settlement_template(update: &PaymentUpdate, failure_reason: &str) -> Option<EmailTemplate> {
    match update.transitioned {
        Some(OrderStatus::Completed) => Some(EmailTemplate::PaymentReceived(update.order.summary())),
        Some(OrderStatus::Failed) => Some(EmailTemplate::PaymentFailed {
            summary: update.order.summary(),
            reason: failure_reason.to_string(),
        }),
        Some(OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Cancelled) | None => None,
    }
}

/// Render and send a template. Failures are logged; email never blocks order processing.
pub async fn deliver(mailer: &dyn Mailer, template: EmailTemplate) {
    let result = match template.render() {
        Ok(message) => mailer.send(message).await,
        Err(error) => Err(MailerError::from(error)),
    };

    if let Err(error) = result {
        tracing::error!(%error, "failed to deliver email");
    }
}
