//! Chain status service client.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront::{
    orders::CryptoAsset,
    payments::{CryptoPaymentRequest, Observation},
};
use thiserror::Error;

/// Configuration for connecting to the chain status service.
#[derive(Debug, Clone)]
pub struct ChainStatusConfig {
    /// Service address, e.g. `"https://chain.example.com"`.
    pub base_url: String,

    /// Bearer key sent with every request, if the service requires one.
    pub api_key: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Address and amount the customer should pay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CryptoInvoice {
    pub address: String,
    pub amount: Decimal,
}

/// Looks up transactions paying a crypto request.
#[automock]
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    async fn lookup(&self, request: &CryptoPaymentRequest) -> Result<Observation, ChainClientError>;
}

/// Allocates receiving addresses and converts order totals into crypto amounts.
#[automock]
#[async_trait]
pub trait CryptoInvoicer: Send + Sync {
    async fn create_invoice(
        &self,
        asset: CryptoAsset,
        amount: u64,
        currency: &str,
    ) -> Result<CryptoInvoice, ChainClientError>;
}

/// HTTP client for the chain status service.
#[derive(Debug, Clone)]
pub struct ChainStatusClient {
    config: ChainStatusConfig,
    http: Client,
}

impl ChainStatusClient {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ChainStatusConfig) -> Result<Self, ChainClientError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        action: &str,
    ) -> Result<T, ChainClientError> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(ChainClientError::UnexpectedResponse(format!(
                "{action} request failed with status {status}: {text}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TransactionLookup for ChainStatusClient {
    async fn lookup(&self, request: &CryptoPaymentRequest) -> Result<Observation, ChainClientError> {
        let url = self.url(&format!("/v1/addresses/{}/transactions", request.address));

        let response = self
            .authorize(self.http.get(&url))
            .query(&[
                ("asset", request.asset.as_str().to_string()),
                ("amount", request.expected_amount.to_string()),
            ])
            .send()
            .await?;

        let parsed: TransactionsResponse = Self::read_json(response, "transactions").await?;

        Ok(parsed.into_observation(request.expected_amount))
    }
}

#[async_trait]
impl CryptoInvoicer for ChainStatusClient {
    async fn create_invoice(
        &self,
        asset: CryptoAsset,
        amount: u64,
        currency: &str,
    ) -> Result<CryptoInvoice, ChainClientError> {
        let response = self
            .authorize(self.http.post(self.url("/v1/invoices")))
            .json(&InvoiceRequest {
                asset: asset.as_str(),
                amount,
                currency,
            })
            .send()
            .await?;

        let invoice: CryptoInvoice = Self::read_json(response, "invoice").await?;

        if invoice.address.trim().is_empty() || invoice.amount <= Decimal::ZERO {
            return Err(ChainClientError::UnexpectedResponse(
                "invoice has no address or a non-positive amount".to_string(),
            ));
        }

        Ok(invoice)
    }
}

#[derive(Debug, Serialize)]
struct InvoiceRequest<'a> {
    asset: &'a str,
    amount: u64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<TransactionData>,
}

#[derive(Debug, Clone, Deserialize)]
struct TransactionData {
    tx_hash: String,
    amount: Decimal,
    confirmations: u32,
}

impl TransactionsResponse {
    /// Prefer a transaction covering the expected amount, then the largest one.
    fn into_observation(self, expected: Decimal) -> Observation {
        let best = self.transactions.into_iter().max_by(|a, b| {
            (a.amount >= expected, a.amount, a.confirmations).cmp(&(
                b.amount >= expected,
                b.amount,
                b.confirmations,
            ))
        });

        match best {
            Some(tx) => Observation::Seen {
                tx_hash: tx.tx_hash,
                amount: tx.amount,
                confirmations: tx.confirmations,
            },
            None => Observation::NotFound,
        }
    }
}
