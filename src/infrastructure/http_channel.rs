//! Downstream transaction processor reached over HTTP.

use crate::domain::ports::{DownstreamReply, DownstreamRequest, TransactionChannel};
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_TRANSACTIONS_PATH: &str = "/api/v1/transactions";

/// Posts each transaction as JSON to `{base_url}{path}`.
///
/// Any 2xx reply is a success; the body is parsed leniently and only used
/// for logging. Non-2xx replies become `DownstreamRejected`.
#[derive(Clone)]
pub struct HttpTransactionChannel {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpTransactionChannel {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(DispatchError::ConfigError(
                "downstream base URL must not be empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{base_url}{path}"),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransactionChannel for HttpTransactionChannel {
    #[tracing::instrument(skip(self, request), fields(transaction_id = %request.transaction_id))]
    async fn execute(&self, request: &DownstreamRequest) -> Result<DownstreamReply> {
        tracing::debug!(url = %self.url, timeout_ms = self.timeout.as_millis() as u64, "Executing HTTP request");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "HTTP request failed"))?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DispatchError::DownstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let reply = serde_json::from_str::<DownstreamReply>(&body).unwrap_or_default();
        tracing::debug!(
            status = status.as_u16(),
            downstream_status = reply.status.as_deref().unwrap_or(""),
            "HTTP request completed"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_base_url() {
        let result = HttpTransactionChannel::new("", DEFAULT_TRANSACTIONS_PATH, Duration::from_secs(1));
        assert!(matches!(result, Err(DispatchError::ConfigError(_))));
    }

    #[test]
    fn test_url_joining() {
        let channel = HttpTransactionChannel::new(
            "http://localhost:8081/",
            DEFAULT_TRANSACTIONS_PATH,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(channel.url(), "http://localhost:8081/api/v1/transactions");
    }
}
