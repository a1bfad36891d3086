use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::ScanProvider;
use crate::{Result, ScanError};

const API_KEY_HEADER: &str = "API-Key";

/// Connection settings for the urlscan.io-compatible provider API.
#[derive(Debug, Clone)]
pub struct UrlscanConfig {
    pub base_url: String,
    pub api_key: String,
    /// Total submit attempts when rate-limited (including the first).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub retry_initial_delay: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for UrlscanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://urlscan.io/api/v1".to_string(),
            api_key: String::new(),
            max_retries: 3,
            retry_initial_delay: Duration::from_millis(5_000),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    uuid: String,
}

/// HTTP client for the external scanning provider.
#[derive(Debug, Clone)]
pub struct UrlscanClient {
    http: reqwest::Client,
    config: UrlscanConfig,
}

impl UrlscanClient {
    pub fn new(config: UrlscanConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScanError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ScanProvider for UrlscanClient {
    async fn submit(&self, url: &str) -> Option<String> {
        let endpoint = self.endpoint("scan/");
        let body = serde_json::json!({ "url": url });
        let mut delay = self.config.retry_initial_delay;

        for attempt in 1..=self.config.max_retries.max(1) {
            debug!(attempt, url, "submitting scan to provider");

            let response = match self
                .http
                .post(&endpoint)
                .header(API_KEY_HEADER, &self.config.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!(url, error = %e, "scan submission request failed");
                    return None;
                }
            };

            let status = response.status();
            if status.is_success() {
                return match response.json::<SubmitResponse>().await {
                    Ok(parsed) => {
                        info!(url, uuid = %parsed.uuid, "scan submitted");
                        Some(parsed.uuid)
                    }
                    Err(e) => {
                        error!(url, error = %e, "malformed submission response");
                        None
                    }
                };
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.config.max_retries {
                    warn!(
                        url,
                        attempt,
                        max_attempts = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited by provider, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                } else {
                    error!(url, "max retries reached while rate limited");
                }
                continue;
            }

            // Any other client error is permanent for this submission.
            error!(url, %status, "provider rejected scan submission");
            return None;
        }

        None
    }

    async fn fetch_result(&self, external_id: &str) -> Option<serde_json::Value> {
        let endpoint = self.endpoint(&format!("result/{external_id}/"));

        let response = match self
            .http
            .get(&endpoint)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(external_id, error = %e, "result fetch request failed");
                return None;
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<serde_json::Value>().await {
                Ok(payload) => Some(payload),
                Err(e) => {
                    error!(external_id, error = %e, "malformed result payload");
                    None
                }
            };
        }

        if status == StatusCode::NOT_FOUND {
            info!(external_id, "scan result not yet available");
            return None;
        }

        error!(external_id, %status, "result fetch failed");
        None
    }
}
