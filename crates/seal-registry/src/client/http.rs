//! HTTP layer: auth headers, status mapping, retry.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::types::RegistryConfig;

/// Outcome of a request where 404 is an expected answer.
#[derive(Debug)]
pub(crate) enum Optional {
    Missing,
    Present(reqwest::Response),
}

/// HTTP backend for making requests (holds reqwest client, auth, config).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) config: RegistryConfig,
}

impl HttpBackend {
    /// Request where 404 maps to `Optional::Missing` instead of an error.
    pub(crate) async fn request_optional(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &str,
        what: &str,
    ) -> RegistryResult<Optional> {
        match self.request(method, url, accept, what).await {
            Ok(response) => Ok(Optional::Present(response)),
            Err(RegistryError::NotFound { .. }) => {
                debug!(url, "not found");
                Ok(Optional::Missing)
            }
            Err(e) => Err(e),
        }
    }

    /// Make a request, retrying transient failures with jittered backoff.
    ///
    /// `what` names the requested object in `NotFound` errors.
    pub(crate) async fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &str,
        what: &str,
    ) -> RegistryResult<reqwest::Response> {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            let result = self.request_once(method.clone(), url, accept, what).await;

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        RegistryError::RateLimited {
                            retry_after: Some(retry_after),
                        } => {
                            let capped = (*retry_after).min(MAX_BACKOFF);
                            let base_ms = capped.as_millis() as u64;
                            let jitter_factor: f64 =
                                rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
                            Duration::from_millis(jittered_ms.max(100))
                        }
                        _ => {
                            let base_backoff = exponential_backoff(retries);
                            let jittered_ms =
                                rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                            Duration::from_millis(jittered_ms.max(10))
                        }
                    };

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &str,
        what: &str,
    ) -> RegistryResult<reqwest::Response> {
        let mut request = self.client.request(method, url).header(ACCEPT, accept);

        if let Some(value) = self.authorization() {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => Ok(response),

            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RegistryError::Unauthorized {
                message: format!("HTTP {} for {}", status.as_u16(), what),
            }),

            StatusCode::NOT_FOUND => Err(RegistryError::NotFound {
                reference: what.to_string(),
            }),

            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);

                Err(RegistryError::RateLimited { retry_after })
            }

            _ => {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                Err(RegistryError::Network {
                    message: format!("HTTP {}: {}", status.as_u16(), message),
                })
            }
        }
    }

    /// Authorization header value: bearer token, else basic auth.
    fn authorization(&self) -> Option<String> {
        if let Some(token) = &self.config.token {
            return Some(format!("Bearer {}", token));
        }
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => Some(format!(
                "Basic {}",
                BASE64.encode(format!("{}:{}", user, pass))
            )),
            _ => None,
        }
    }
}

/// Upper bound for one exponential backoff step.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `2^retries` seconds, capped at [`MAX_BACKOFF`] for any retry count.
fn exponential_backoff(retries: u32) -> Duration {
    let secs = 1_u64.checked_shl(retries).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}
