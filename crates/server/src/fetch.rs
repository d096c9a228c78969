use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Failures are cloneable so that every caller sharing a cached fetch gets one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Server side and throttling failures are worth another attempt, client errors and
    /// bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::Network(_) => true,
            Self::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// GETs `url` and parses the body as JSON, retrying transient failures.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    policy: &RetryPolicy,
) -> Result<T, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_once(client, url, query).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                attempt += 1;
                warn!("Fetching {url} failed ({err}), retry {attempt}/{}", policy.retries);
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn fetch_once<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, FetchError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| FetchError::Network(err.to_string()))?;
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            message: body,
        });
    }
    serde_json::from_str(&body).map_err(|err| FetchError::Decode(err.to_string()))
}

#[test]
fn only_transient_failures_retry() {
    let http = |status| FetchError::Http {
        status,
        message: String::new(),
    };
    assert!(http(503).is_retryable());
    assert!(http(429).is_retryable());
    assert!(!http(404).is_retryable());
    assert!(FetchError::Network("reset".into()).is_retryable());
    assert!(!FetchError::Decode("eof".into()).is_retryable());
}
