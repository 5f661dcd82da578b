//! Transactional Email
//!
//! Renders order and payment notifications into plain text and HTML bodies. Delivery is left
//! to the caller.

use rusty_money::{Money, iso::Currency};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::tiers::SubscriptionTier;

/// Errors raised while rendering a message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailError {
    /// An amount did not fit the money formatter.
    #[error("amount {0} is too large to format")]
    AmountOutOfRange(u64),
}

/// Rendered message, ready to hand to a mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,

    /// Subject line.
    pub subject: String,

    /// Plain text body.
    pub text: String,

    /// HTML body.
    pub html: String,
}

/// Line of an order as shown in emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    /// Product name.
    pub name: String,

    /// Tier bought.
    pub tier: SubscriptionTier,

    /// Units bought.
    pub quantity: u32,

    /// Line total in minor units.
    pub line_total: u64,
}

/// Order details shared by every template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    /// Order identifier.
    pub order_uuid: Uuid,

    /// Customer address.
    pub customer_email: String,

    /// Ordered lines.
    pub lines: Vec<SummaryLine>,

    /// Applied discount code and amount, if any.
    pub discount: Option<(String, u64)>,

    /// Amount payable in minor units.
    pub total: u64,

    /// Order currency.
    pub currency: &'static Currency,
}

/// Notification kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Sent when an order is placed.
    OrderConfirmation(OrderSummary),

    /// Sent once payment settles.
    PaymentReceived(OrderSummary),

    /// Sent when payment fails, expires or is short.
    PaymentFailed {
        /// The affected order.
        summary: OrderSummary,

        /// Human readable reason.
        reason: String,
    },
}

impl EmailTemplate {
    fn summary(&self) -> &OrderSummary {
        match self {
            Self::OrderConfirmation(summary)
            | Self::PaymentReceived(summary)
            | Self::PaymentFailed { summary, .. } => summary,
        }
    }

    fn subject(&self) -> String {
        let order = short_reference(self.summary().order_uuid);

        match self {
            Self::OrderConfirmation(_) => format!("Order {order} received"),
            Self::PaymentReceived(_) => format!("Payment received for order {order}"),
            Self::PaymentFailed { .. } => format!("Payment failed for order {order}"),
        }
    }

    fn intro(&self) -> String {
        match self {
            Self::OrderConfirmation(_) => {
                "Thanks for your order. It will be activated as soon as payment settles."
                    .to_string()
            }
            Self::PaymentReceived(_) => {
                "Your payment has been received and your subscriptions are now active."
                    .to_string()
            }
            Self::PaymentFailed { reason, .. } => {
                format!("We could not complete payment for your order: {reason}.")
            }
        }
    }

    /// Render into a message addressed to the order's customer.
    pub fn render(&self) -> Result<EmailMessage, EmailError> {
        let summary = self.summary();
        let intro = self.intro();

        let mut rows = Vec::with_capacity(summary.lines.len());

        for line in &summary.lines {
            rows.push((
                format!("{} ({}) x{}", line.name, line.tier.label(), line.quantity),
                format_minor(line.line_total, summary.currency)?,
            ));
        }

        let discount = summary
            .discount
            .as_ref()
            .map(|(code, amount)| {
                format_minor(*amount, summary.currency).map(|amount| (code.as_str(), amount))
            })
            .transpose()?;

        let total = format_minor(summary.total, summary.currency)?;

        let mut text = format!("{intro}\n\n");
        let mut html = format!("<p>{}</p>\n<table>\n", escape_html(&intro));

        for (label, amount) in &rows {
            text.push_str(&format!("{label}: {amount}\n"));
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape_html(label),
                escape_html(amount)
            ));
        }

        if let Some((code, amount)) = &discount {
            text.push_str(&format!("Discount {code}: -{amount}\n"));
            html.push_str(&format!(
                "<tr><td>Discount {}</td><td>-{}</td></tr>\n",
                escape_html(code),
                escape_html(amount)
            ));
        }

        text.push_str(&format!("Total: {total}\n"));
        html.push_str(&format!(
            "<tr><th>Total</th><th>{}</th></tr>\n</table>\n",
            escape_html(&total)
        ));

        Ok(EmailMessage {
            to: summary.customer_email.clone(),
            subject: self.subject(),
            text,
            html,
        })
    }
}

fn short_reference(uuid: Uuid) -> String {
    uuid.simple().to_string().chars().take(8).collect()
}

fn format_minor(amount: u64, currency: &'static Currency) -> Result<String, EmailError> {
    let minor = i64::try_from(amount).map_err(|_source| EmailError::AmountOutOfRange(amount))?;

    Ok(Money::from_minor(minor, currency).to_string())
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use rusty_money::iso;
    use testresult::TestResult;

    use super::*;

    fn summary() -> OrderSummary {
        OrderSummary {
            order_uuid: Uuid::from_u128(0xabcd_ef01_0000_0000_0000_0000_0000_0000),
            customer_email: "player@example.com".to_string(),
            lines: vec![SummaryLine {
                name: "Aim <Pro>".to_string(),
                tier: SubscriptionTier::Weekly,
                quantity: 2,
                line_total: 20_00,
            }],
            discount: Some(("SAVE5".to_string(), 5_00)),
            total: 15_00,
            currency: iso::USD,
        }
    }

    #[test]
    fn order_confirmation_lists_lines_and_totals() -> TestResult {
        let message = EmailTemplate::OrderConfirmation(summary()).render()?;

        assert_eq!(message.to, "player@example.com");
        assert_eq!(message.subject, "Order abcdef01 received");
        assert!(
            message.text.contains("Aim <Pro> (Weekly) x2: $20.00"),
            "text was {}",
            message.text
        );
        assert!(
            message.text.contains("Discount SAVE5: -$5.00"),
            "text was {}",
            message.text
        );
        assert!(
            message.text.contains("Total: $15.00"),
            "text was {}",
            message.text
        );

        Ok(())
    }

    #[test]
    fn html_part_escapes_user_strings() -> TestResult {
        let message = EmailTemplate::PaymentReceived(summary()).render()?;

        assert!(
            message.html.contains("Aim &lt;Pro&gt;"),
            "html was {}",
            message.html
        );
        assert!(!message.html.contains("<Pro>"), "html was {}", message.html);

        Ok(())
    }

    #[test]
    fn payment_failed_includes_reason() -> TestResult {
        let message = EmailTemplate::PaymentFailed {
            summary: summary(),
            reason: "payment expired".to_string(),
        }
        .render()?;

        assert_eq!(message.subject, "Payment failed for order abcdef01");
        assert!(
            message
                .text
                .starts_with("We could not complete payment for your order: payment expired."),
            "text was {}",
            message.text
        );

        Ok(())
    }

    #[test]
    fn escape_html_handles_quotes_and_ampersands() {
        assert_eq!(
            escape_html(r#"a & "b" 'c'"#),
            "a &amp; &quot;b&quot; &#39;c&#39;"
        );
    }
}
