//! App Context

use std::{fmt, sync::Arc, time::Duration};

use jiff::SignedDuration;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    auth::{AuthService, PgAuthService},
    database::{self, Db},
    domain::{
        discounts::{DiscountsService, PgDiscountsService},
        orders::{OrdersService, OrdersServiceError, PgOrdersService},
        products::{PgProductsService, ProductsService},
    },
    notifications::{Mailer, TracingMailer},
    payments::{
        ChainClientError, ChainStatusClient, ChainStatusConfig, CryptoPaymentPoller,
        OrderPaymentSink, PaymentWatcher,
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply database migrations")]
    Migrate(#[source] sqlx::migrate::MigrateError),

    #[error("failed to build chain status client")]
    ChainClient(#[source] ChainClientError),
}

/// Settings needed to wire the application together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub currency: &'static Currency,
    pub chain: ChainStatusConfig,
    pub payment_window: SignedDuration,
    pub poll_interval: Duration,
    pub mail_from: String,
}

#[derive(Clone)]
pub struct AppContext {
    pub products: Arc<dyn ProductsService>,
    pub discounts: Arc<dyn DiscountsService>,
    pub orders: Arc<dyn OrdersService>,
    pub auth: Arc<dyn AuthService>,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentWatcher>,
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}

impl AppContext {
    /// Connect to the database, apply migrations and build every service.
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable, a migration fails, or the chain
    /// status client cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppInitError> {
        let pool = database::connect(&config.database_url)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool)
            .await
            .map_err(AppInitError::Migrate)?;

        let db = Db::new(pool);

        let chain = Arc::new(
            ChainStatusClient::new(config.chain.clone()).map_err(AppInitError::ChainClient)?,
        );

        let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer::new(config.mail_from.clone()));

        let orders: Arc<dyn OrdersService> = Arc::new(PgOrdersService::new(
            db.clone(),
            config.currency,
            chain.clone(),
            config.payment_window,
        ));

        let sink = Arc::new(OrderPaymentSink::new(orders.clone(), mailer.clone()));

        Ok(Self {
            products: Arc::new(PgProductsService::new(db.clone())),
            discounts: Arc::new(PgDiscountsService::new(db.clone())),
            orders,
            auth: Arc::new(PgAuthService::new(db)),
            mailer,
            payments: Arc::new(CryptoPaymentPoller::new(chain, sink, config.poll_interval)),
        })
    }

    /// Start polling every crypto payment left unsettled by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the unsettled payments cannot be listed.
    pub async fn resume_payment_watchers(&self) -> Result<usize, OrdersServiceError> {
        let watched = self.orders.list_watchable_payments().await?;
        let count = watched.len();

        for payment in watched {
            self.payments
                .watch(payment.order, payment.request, payment.progress);
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use storefront::{
        orders::CryptoAsset,
        payments::{CryptoPaymentRequest, PaymentProgress},
    };
    use testresult::TestResult;

    use crate::{
        auth::MockAuthService,
        domain::{
            discounts::MockDiscountsService,
            orders::{MockOrdersService, data::WatchedPayment, records::OrderUuid},
            products::MockProductsService,
        },
        notifications::MockMailer,
        payments::MockPaymentWatcher,
    };

    use super::*;

    #[tokio::test]
    async fn resume_watches_every_unsettled_payment() -> TestResult {
        let expires_at = "2026-01-01T00:00:00Z".parse()?;
        let watched = vec![
            WatchedPayment {
                order: OrderUuid::new(),
                request: CryptoPaymentRequest {
                    address: "bc1qone".to_string(),
                    expected_amount: dec!(0.001),
                    asset: CryptoAsset::Bitcoin,
                    required_confirmations: 2,
                    expires_at,
                },
                progress: PaymentProgress::AwaitingTransaction,
            },
            WatchedPayment {
                order: OrderUuid::new(),
                request: CryptoPaymentRequest {
                    address: "0xtwo".to_string(),
                    expected_amount: dec!(0.02),
                    asset: CryptoAsset::Ethereum,
                    required_confirmations: 12,
                    expires_at,
                },
                progress: PaymentProgress::Confirming {
                    tx_hash: "0xabc".to_string(),
                    confirmations: 4,
                },
            },
        ];

        let mut orders = MockOrdersService::new();
        let mut payments = MockPaymentWatcher::new();

        orders
            .expect_list_watchable_payments()
            .times(1)
            .return_once(move || Ok(watched));
        payments.expect_watch().times(2).return_const(());

        let context = AppContext {
            products: Arc::new(MockProductsService::new()),
            discounts: Arc::new(MockDiscountsService::new()),
            orders: Arc::new(orders),
            auth: Arc::new(MockAuthService::new()),
            mailer: Arc::new(MockMailer::new()),
            payments: Arc::new(payments),
        };

        assert_eq!(context.resume_payment_watchers().await?, 2);

        Ok(())
    }
}
