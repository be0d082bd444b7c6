//! Holder and price data from interchangeable public APIs.
//!
//! Endpoints are tried in priority order. Each one gets a fixed number of
//! attempts with a fixed delay in between, but only for network-level
//! failures: an endpoint that answers with nothing usable is skipped right
//! away. The first endpoint yielding data wins and its result is cached per
//! data type.
//!
//! No data is never reported as an empty success. If no endpoint yields
//! holders, the call fails with [`FetchError::Exhausted`] carrying the last
//! underlying cause.

mod cache;
mod holders;
mod price;
mod shape;
mod source;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;

use crate::config::FetchConfig;
use crate::tracing::prelude::*;

pub use cache::Cache;
pub use holders::{
    filter_wallets, is_wallet_address, HolderRecord, Leaderboard, RankedHolder, BASE_UNITS_PER_KALE,
};
pub use price::{Quote, QuoteSource};
pub use shape::{unwrap_array, Envelope};
pub use source::{HttpSource, ReqwestSource, SourceError};

/// One data source, with an optional hint about where its payload lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: String,
    pub shape: Option<Envelope>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shape: None,
        }
    }

    pub fn with_shape(mut self, shape: Envelope) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Host part of the URL, for logs.
    fn host(&self) -> &str {
        self.url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or(&self.url)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FetchError {
    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("all {endpoints} endpoints failed, last error: {last}")]
    Exhausted { endpoints: usize, last: SourceError },
}

/// Fetches and caches holder leaderboards and price quotes.
pub struct Fetcher {
    source: Arc<dyn HttpSource>,
    config: FetchConfig,
    holders: Cache<Leaderboard>,
    price: Cache<Quote>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn HttpSource>, config: FetchConfig) -> Self {
        Self {
            source,
            holders: Cache::new(config.holders_ttl),
            price: Cache::new(config.price_ttl),
            config,
        }
    }

    /// Fetcher over real HTTP.
    pub fn from_config(config: FetchConfig) -> anyhow::Result<Self> {
        let source = ReqwestSource::new(config.request_timeout)?;
        Ok(Self::new(Arc::new(source), config))
    }

    pub fn default_limit(&self) -> usize {
        self.config.top_limit
    }

    /// The top `limit` wallet holders, highest balance first.
    ///
    /// The cache keeps the whole ranked list, so a fresh entry serves any
    /// `limit` without touching the network.
    pub async fn top_holders(&self, limit: usize) -> Result<Leaderboard, FetchError> {
        if let Some(board) = self.holders.get() {
            debug!(limit, "Using cached holders");
            return Ok(board.top(limit));
        }

        let board = self
            .first_success(&self.config.holder_endpoints, |endpoint, body| {
                let entries = unwrap_array(&body, endpoint.shape)
                    .ok_or_else(|| SourceError::Malformed("no holder array in response".into()))?;
                if entries.is_empty() {
                    return Err(SourceError::Empty);
                }

                let wallets = filter_wallets(entries);
                debug!(
                    endpoint = endpoint.host(),
                    wallets = wallets.len(),
                    total = entries.len(),
                    "Filtered wallet holders"
                );
                if wallets.is_empty() {
                    return Err(SourceError::NoWallets {
                        total: entries.len(),
                    });
                }

                Ok(Leaderboard::rank(&endpoint.url, wallets))
            })
            .await?;

        info!(
            holders = board.holder_count,
            endpoint = %board.endpoint,
            "Fetched holders"
        );
        Ok(self.holders.put(board).top(limit))
    }

    /// Current KALE price.
    ///
    /// When every price source fails and a placeholder price is configured,
    /// the placeholder is returned marked as [`QuoteSource::Placeholder`].
    pub async fn price(&self) -> Result<Quote, FetchError> {
        if let Some(quote) = self.price.get() {
            debug!("Using cached price");
            return Ok((*quote).clone());
        }

        let token = self.config.token_address.as_str();
        let result = self
            .first_success(&self.config.price_endpoints, |endpoint, body| {
                price::parse_quote(&body, token, &endpoint.url)
            })
            .await;

        match (result, self.config.price_placeholder) {
            (Ok(quote), _) => Ok((*self.price.put(quote)).clone()),
            (Err(e), Some(placeholder)) => {
                warn!(error = %e, placeholder, "Price unavailable, serving placeholder");
                Ok(Quote::placeholder(placeholder))
            }
            (Err(e), None) => Err(e),
        }
    }

    /// Run `parse` over each endpoint's response until one succeeds.
    async fn first_success<T, F>(&self, endpoints: &[Endpoint], parse: F) -> Result<T, FetchError>
    where
        F: Fn(&Endpoint, Value) -> Result<T, SourceError>,
    {
        let mut last = None;

        for (i, endpoint) in endpoints.iter().enumerate() {
            debug!(
                endpoint = endpoint.host(),
                "Trying endpoint {}/{}",
                i + 1,
                endpoints.len()
            );

            let outcome = match self.get_with_retries(endpoint).await {
                Ok(body) => parse(endpoint, body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(endpoint = endpoint.host(), error = %e, "Endpoint failed");
                    last = Some(e);
                }
            }
        }

        match last {
            Some(last) => {
                error!(endpoints = endpoints.len(), "All endpoints failed");
                Err(FetchError::Exhausted {
                    endpoints: endpoints.len(),
                    last,
                })
            }
            None => Err(FetchError::NoEndpoints),
        }
    }

    async fn get_with_retries(&self, endpoint: &Endpoint) -> Result<Value, SourceError> {
        let attempts = self.config.retries.max(1);
        let mut attempt = 1;

        loop {
            match self.source.get_json(&endpoint.url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    debug!(
                        endpoint = endpoint.host(),
                        attempt,
                        error = %e,
                        "Request failed, retrying"
                    );
                    attempt += 1;
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
