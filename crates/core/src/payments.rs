//! Crypto Payment Progress
//!
//! Tracks an on-chain payment from "waiting for a transaction" to a terminal outcome. Each
//! poll of the chain produces an [`Observation`] which [`PaymentProgress::advance`] folds into
//! the current state.

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::{CryptoAsset, PaymentStatus};

/// What the storefront expects to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoPaymentRequest {
    /// Receiving address shown to the customer.
    pub address: String,

    /// Expected amount in whole units of `asset`.
    pub expected_amount: Decimal,

    /// Asset being paid.
    pub asset: CryptoAsset,

    /// Confirmations needed to settle.
    pub required_confirmations: u32,

    /// Deadline for a transaction to appear.
    pub expires_at: Timestamp,
}

/// Result of a single chain lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Observation {
    /// No matching transaction yet.
    NotFound,

    /// A transaction to the address was found.
    Seen {
        /// Transaction hash.
        tx_hash: String,

        /// Amount received in whole units.
        amount: Decimal,

        /// Current confirmation count.
        confirmations: u32,
    },
}

/// Where a payment currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentProgress {
    /// Waiting for a transaction.
    AwaitingTransaction,

    /// Transaction found, waiting for confirmations.
    Confirming {
        /// Transaction hash.
        tx_hash: String,

        /// Highest confirmation count seen.
        confirmations: u32,
    },

    /// Transaction reached the required confirmations.
    Confirmed {
        /// Transaction hash.
        tx_hash: String,

        /// Confirmation count when settled.
        confirmations: u32,
    },

    /// Transaction found for less than the expected amount.
    Underpaid {
        /// Transaction hash.
        tx_hash: String,

        /// Amount actually received.
        received: Decimal,
    },

    /// No transaction appeared before the deadline.
    Expired,
}

impl PaymentProgress {
    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed { .. } | Self::Underpaid { .. } | Self::Expired
        )
    }

    /// Payment status recorded for this progress.
    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        match self {
            Self::AwaitingTransaction => PaymentStatus::Pending,
            Self::Confirming { .. } => PaymentStatus::Confirming,
            Self::Confirmed { .. } => PaymentStatus::Confirmed,
            Self::Underpaid { .. } => PaymentStatus::Underpaid,
            Self::Expired => PaymentStatus::Expired,
        }
    }

    /// Transaction hash, once one has been seen.
    #[must_use]
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Self::Confirming { tx_hash, .. }
            | Self::Confirmed { tx_hash, .. }
            | Self::Underpaid { tx_hash, .. } => Some(tx_hash),
            Self::AwaitingTransaction | Self::Expired => None,
        }
    }

    /// Confirmations seen so far.
    #[must_use]
    pub const fn confirmations(&self) -> u32 {
        match self {
            Self::Confirming { confirmations, .. } | Self::Confirmed { confirmations, .. } => {
                *confirmations
            }
            Self::AwaitingTransaction | Self::Underpaid { .. } | Self::Expired => 0,
        }
    }

    /// Fold an observation made at `now` into the current progress.
    #[must_use]
    pub fn advance(
        self,
        request: &CryptoPaymentRequest,
        observation: Observation,
        now: Timestamp,
    ) -> Self {
        if self.is_terminal() {
            return self;
        }

        match observation {
            Observation::NotFound => match self {
                Self::AwaitingTransaction if now >= request.expires_at => Self::Expired,
                other => other,
            },
            Observation::Seen {
                tx_hash,
                amount,
                confirmations,
            } => {
                if amount < request.expected_amount {
                    return Self::Underpaid {
                        tx_hash,
                        received: amount,
                    };
                }

                let confirmations = confirmations.max(self.confirmations());

                if confirmations >= request.required_confirmations {
                    Self::Confirmed {
                        tx_hash,
                        confirmations,
                    }
                } else {
                    Self::Confirming {
                        tx_hash,
                        confirmations,
                    }
                }
            }
        }
    }
}
