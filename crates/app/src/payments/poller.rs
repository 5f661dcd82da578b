//! Crypto payment poller.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use storefront::payments::{CryptoPaymentRequest, Observation, PaymentProgress};
use tokio::time::{MissedTickBehavior, interval};
use tracing::Instrument;

use crate::{
    domain::orders::records::OrderUuid,
    payments::{PaymentSinkError, TransactionLookup},
};

/// Receives every change in a payment's progress.
#[automock]
#[async_trait]
pub trait PaymentProgressSink: Send + Sync {
    async fn record(
        &self,
        order: OrderUuid,
        progress: &PaymentProgress,
    ) -> Result<(), PaymentSinkError>;
}

/// Starts background tracking of a crypto payment.
#[automock]
pub trait PaymentWatcher: Send + Sync {
    fn watch(&self, order: OrderUuid, request: CryptoPaymentRequest, progress: PaymentProgress);
}

/// Polls the chain until a payment reaches a terminal state.
#[derive(Clone)]
pub struct CryptoPaymentPoller {
    lookup: Arc<dyn TransactionLookup>,
    sink: Arc<dyn PaymentProgressSink>,
    poll_interval: Duration,
}

impl fmt::Debug for CryptoPaymentPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoPaymentPoller")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl CryptoPaymentPoller {
    #[must_use]
    pub fn new(
        lookup: Arc<dyn TransactionLookup>,
        sink: Arc<dyn PaymentProgressSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            lookup,
            sink,
            poll_interval,
        }
    }

    /// Poll until `progress` is terminal, returning the final state.
    ///
    /// A failed lookup or a failed write to the sink is logged and retried on the next tick;
    /// progress only moves forward once the sink has accepted it. Once the deadline has passed a
    /// failed lookup counts as "no transaction", so an unreachable chain cannot hold an unpaid
    /// invoice open.
    pub async fn run(
        &self,
        order: OrderUuid,
        request: CryptoPaymentRequest,
        mut progress: PaymentProgress,
    ) -> PaymentProgress {
        let mut ticker = interval(self.poll_interval);

        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !progress.is_terminal() {
            ticker.tick().await;

            let observation = match self.lookup.lookup(&request).await {
                Ok(observation) => observation,
                Err(error) if Timestamp::now() >= request.expires_at => {
                    tracing::warn!(%error, "transaction lookup failed after the payment deadline");

                    Observation::NotFound
                }
                Err(error) => {
                    tracing::warn!(%error, "transaction lookup failed");

                    continue;
                }
            };

            let next = progress.clone().advance(&request, observation, Timestamp::now());

            if next == progress {
                continue;
            }

            match self.sink.record(order, &next).await {
                Ok(()) => {
                    tracing::info!(
                        status = next.status().as_str(),
                        confirmations = next.confirmations(),
                        "payment progressed"
                    );

                    progress = next;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to record payment progress");
                }
            }
        }

        progress
    }
}

impl PaymentWatcher for CryptoPaymentPoller {
    fn watch(&self, order: OrderUuid, request: CryptoPaymentRequest, progress: PaymentProgress) {
        let poller = self.clone();
        let span = tracing::info_span!("payment_poller", %order, asset = request.asset.as_str());

        tokio::spawn(
            async move {
                poller.run(order, request, progress).await;
            }
            .instrument(span),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use jiff::SignedDuration;
    use rust_decimal::{Decimal, dec};
    use storefront::orders::CryptoAsset;
    use testresult::TestResult;

    use crate::{
        domain::orders::OrdersServiceError,
        payments::{ChainClientError, MockTransactionLookup},
    };

    use super::*;

    fn request(expires_at: Timestamp) -> CryptoPaymentRequest {
        CryptoPaymentRequest {
            address: "ltc1qexample".to_string(),
            expected_amount: dec!(0.25),
            asset: CryptoAsset::Litecoin,
            required_confirmations: 6,
            expires_at,
        }
    }

    fn in_an_hour() -> TestResult<Timestamp> {
        Ok(Timestamp::now().checked_add(SignedDuration::from_hours(1))?)
    }

    fn seen(amount: Decimal, confirmations: u32) -> Result<Observation, ChainClientError> {
        Ok(Observation::Seen {
            tx_hash: "tx".to_string(),
            amount,
            confirmations,
        })
    }

    fn scripted(
        script: Vec<Result<Observation, ChainClientError>>,
    ) -> (MockTransactionLookup, Arc<AtomicUsize>) {
        let script = Mutex::new(VecDeque::from(script));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut lookup = MockTransactionLookup::new();

        lookup.expect_lookup().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);

            script
                .lock()
                .ok()
                .and_then(|mut script| script.pop_front())
                .unwrap_or(Ok(Observation::NotFound))
        });

        (lookup, calls)
    }

    fn recording_sink() -> (MockPaymentProgressSink, Arc<Mutex<Vec<PaymentProgress>>>) {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&recorded);

        let mut sink = MockPaymentProgressSink::new();

        sink.expect_record().returning(move |_, progress| {
            if let Ok(mut log) = log.lock() {
                log.push(progress.clone());
            }

            Ok(())
        });

        (sink, recorded)
    }

    fn poller(lookup: MockTransactionLookup, sink: MockPaymentProgressSink) -> CryptoPaymentPoller {
        CryptoPaymentPoller::new(Arc::new(lookup), Arc::new(sink), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_payment_through_to_confirmation() -> TestResult {
        let (lookup, _) = scripted(vec![
            Ok(Observation::NotFound),
            seen(dec!(0.25), 1),
            seen(dec!(0.25), 6),
        ]);
        let (sink, recorded) = recording_sink();

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(in_an_hour()?),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert_eq!(
            outcome,
            PaymentProgress::Confirmed {
                tx_hash: "tx".to_string(),
                confirmations: 6,
            }
        );

        let recorded = recorded.lock().map(|log| log.clone()).unwrap_or_default();

        assert_eq!(recorded.len(), 2, "confirming then confirmed, got {recorded:?}");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_errors_are_retried() -> TestResult {
        let (lookup, calls) = scripted(vec![
            Err(ChainClientError::UnexpectedResponse("503".to_string())),
            seen(dec!(0.3), 6),
        ]);
        let (sink, _) = recording_sink();

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(in_an_hour()?),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert_eq!(outcome.status().as_str(), "confirmed");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "one failed lookup, one success");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn expires_when_deadline_has_passed() -> TestResult {
        let (lookup, _) = scripted(vec![Ok(Observation::NotFound)]);
        let (sink, recorded) = recording_sink();

        let past = Timestamp::now().checked_sub(SignedDuration::from_mins(1))?;

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(past),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert_eq!(outcome, PaymentProgress::Expired);
        assert_eq!(
            recorded.lock().map(|log| log.len()).unwrap_or_default(),
            1,
            "expiry should be recorded once"
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_chain_still_expires_past_the_deadline() -> TestResult {
        let (lookup, calls) = scripted(vec![
            Err(ChainClientError::UnexpectedResponse("503".to_string())),
            Err(ChainClientError::UnexpectedResponse("503".to_string())),
        ]);
        let (sink, recorded) = recording_sink();

        let past = Timestamp::now().checked_sub(SignedDuration::from_mins(1))?;

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(past),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert_eq!(outcome, PaymentProgress::Expired);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "expired on the first failed lookup");
        assert_eq!(
            recorded.lock().map(|log| log.clone()).unwrap_or_default(),
            vec![PaymentProgress::Expired],
            "only the expiry is recorded"
        );

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn seen_payment_is_not_expired_by_a_failed_lookup() -> TestResult {
        let (lookup, calls) = scripted(vec![
            Err(ChainClientError::UnexpectedResponse("503".to_string())),
            seen(dec!(0.25), 6),
        ]);
        let (sink, _) = recording_sink();

        let past = Timestamp::now().checked_sub(SignedDuration::from_mins(1))?;

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(past),
                PaymentProgress::Confirming {
                    tx_hash: "tx".to_string(),
                    confirmations: 3,
                },
            )
            .await;

        assert_eq!(outcome.status().as_str(), "confirmed");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "kept polling after the failure");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn underpayment_stops_polling() -> TestResult {
        let (lookup, calls) = scripted(vec![seen(dec!(0.1), 10)]);
        let (sink, _) = recording_sink();

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(in_an_hour()?),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert!(
            matches!(outcome, PaymentProgress::Underpaid { received, .. } if received == dec!(0.1)),
            "expected underpaid, got {outcome:?}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no polling after a terminal state");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_retried_until_the_sink_accepts_it() -> TestResult {
        let (lookup, _) = scripted(vec![seen(dec!(0.25), 6), seen(dec!(0.25), 7)]);

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let mut sink = MockPaymentProgressSink::new();

        sink.expect_record().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PaymentSinkError::Orders(OrdersServiceError::Sql(
                    sqlx::Error::PoolTimedOut,
                )))
            } else {
                Ok(())
            }
        });

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(in_an_hour()?),
                PaymentProgress::AwaitingTransaction,
            )
            .await;

        assert_eq!(outcome.confirmations(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "first write failed, second landed");

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_progress_is_not_polled() -> TestResult {
        let mut lookup = MockTransactionLookup::new();
        let mut sink = MockPaymentProgressSink::new();

        lookup.expect_lookup().never();
        sink.expect_record().never();

        let outcome = poller(lookup, sink)
            .run(
                OrderUuid::new(),
                request(in_an_hour()?),
                PaymentProgress::Expired,
            )
            .await;

        assert_eq!(outcome, PaymentProgress::Expired);

        Ok(())
    }
}
