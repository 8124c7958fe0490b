//! Async HTTP client for fetching remote grammar sources.

use std::time::Duration;

use reqwest::{Client, Response};
use tokio::time::sleep;

use crate::error::ValidationError;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("validate-rng/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Async HTTP client with retry and exponential backoff.
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self { client, config })
    }

    /// Fetch a URL's body, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, ValidationError> {
        let response = self.get_with_retry(url).await?;
        let bytes = response.bytes().await.map_err(ValidationError::from)?;
        Ok(bytes.to_vec())
    }

    async fn get_with_retry(&self, url: &str) -> Result<Response, ValidationError> {
        let mut attempt = 0u32;
        loop {
            let result = self.client.get(url).send().await;
            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = ValidationError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: status
                            .canonical_reason()
                            .unwrap_or("unknown status")
                            .to_string(),
                    };
                    // Client errors are not retryable.
                    if status.is_client_error() || attempt >= self.config.retry_attempts {
                        return Err(error);
                    }
                }
                Err(e) => {
                    if attempt >= self.config.retry_attempts {
                        if e.is_timeout() {
                            return Err(ValidationError::Timeout {
                                url: url.to_string(),
                                timeout_seconds: self.config.timeout_seconds,
                            });
                        }
                        return Err(ValidationError::from(e));
                    }
                }
            }
            let delay = self
                .config
                .retry_delay_ms
                .saturating_mul(1u64 << attempt.min(16))
                .min(self.config.max_retry_delay_ms);
            sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.user_agent.starts_with("validate-rng/"));
    }

    #[test]
    fn test_client_creation() {
        let client = AsyncHttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let config = HttpClientConfig {
            timeout_seconds: 1,
            retry_attempts: 0,
            retry_delay_ms: 1,
            max_retry_delay_ms: 1,
            ..HttpClientConfig::default()
        };
        let client = AsyncHttpClient::new(config).unwrap();
        // nothing listens on this port
        let result = client.fetch("http://127.0.0.1:9/schema.rng").await;
        assert!(result.is_err());
    }
}
