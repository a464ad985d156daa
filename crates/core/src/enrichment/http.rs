//! HTTP client for the hosted enrichment API.

use super::EnrichmentService;
use crate::config::EnrichmentConfig;
use crate::dataset::Record;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const ENRICH_ENDPOINT: &str = "enrich-lead";
const FIND_CONTACT_ENDPOINT: &str = "find-email";

/// Retry behaviour for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        std::cmp::min(Duration::from_millis(backoff_ms as u64), self.max_backoff)
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }
}

/// [`EnrichmentService`] backed by the enrichment HTTP API
#[derive(Debug, Clone)]
pub struct HttpEnrichmentClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpEnrichmentClient {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::HeaderName::from_static("x-api-key"),
                header::HeaderValue::from_str(api_key).context("Invalid API key format")?,
            );
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid enrichment base URL: {}", config.base_url))?;

        let retry = RetryPolicy {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            ..Default::default()
        };

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Record> {
        let url = self
            .base_url
            .join(endpoint)
            .with_context(|| format!("Invalid endpoint: {}", endpoint))?;
        let mut attempts = 0;

        loop {
            debug!(url = %url, attempt = attempts + 1, "POST request");

            match self.client.post(url.clone()).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let value: Value = response
                            .json()
                            .await
                            .with_context(|| format!("Invalid JSON from {}", endpoint))?;
                        return match value {
                            Value::Object(record) => Ok(record),
                            other => Err(anyhow!(
                                "Expected a JSON object from {}, got {}",
                                endpoint,
                                other
                            )),
                        };
                    }

                    if attempts < self.retry.max_retries && self.retry.should_retry_status(status) {
                        let backoff = self.retry.backoff_for_attempt(attempts);
                        warn!(
                            status = status.as_u16(),
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis() as u64,
                            "Enrichment request failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    bail!("API request failed: {} - {}", status.as_u16(), text);
                }
                Err(e) => {
                    if attempts < self.retry.max_retries && (e.is_timeout() || e.is_connect()) {
                        let backoff = self.retry.backoff_for_attempt(attempts);
                        warn!(
                            attempt = attempts + 1,
                            backoff_ms = backoff.as_millis() as u64,
                            "Enrichment request did not complete, retrying: {}",
                            e
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        continue;
                    }
                    if e.is_timeout() {
                        bail!("Request to {} timed out", endpoint);
                    }
                    return Err(e).with_context(|| format!("Request to {} failed", endpoint));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl EnrichmentService for HttpEnrichmentClient {
    async fn enrich_record(&self, record: &Record, schema: &Map<String, Value>) -> Result<Record> {
        let name = record.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown");
        debug!("Enriching record: {}", name);
        let body = json!({
            "lead_info": record,
            "struct": schema,
        });
        self.post(ENRICH_ENDPOINT, &body).await
    }

    async fn find_contact(&self, record: &Record) -> Result<Record> {
        let name = record.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown");
        debug!("Finding contact for: {}", name);
        let body = json!({
            "person_info": record,
            "struct": {
                "email": "Primary email address",
                "confidence": "Confidence score for the email",
                "source": "Source of the email information",
            },
        });
        self.post(FIND_CONTACT_ENDPOINT, &body).await
    }
}
