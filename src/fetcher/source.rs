use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

const USER_AGENT: &str = "Kale-Bot/1.0";

/// Why a single endpoint attempt produced nothing usable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response holds no entries")]
    Empty,

    #[error("no wallet addresses among {total} entries")]
    NoWallets { total: usize },
}

impl SourceError {
    /// Network-level failures are worth another attempt on the same endpoint.
    /// A well-formed answer with the wrong content is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Transport(_) | SourceError::Status(_))
    }
}

/// Something that turns a URL into a JSON document.
#[async_trait]
pub trait HttpSource: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, SourceError>;
}

/// `reqwest`-backed source used outside of tests.
pub struct ReqwestSource {
    client: reqwest::Client,
}

impl ReqwestSource {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSource for ReqwestSource {
    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        // An undecodable body is usually a truncated or proxied response.
        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Transport(format!("invalid JSON body: {}", e)))
    }
}
