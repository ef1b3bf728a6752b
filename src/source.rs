//! Retrieval of the source table, parameterized by geography.
//!
//! The engine never fetches on its own; hosts hand it a `TableSource`. The
//! production implementation pulls the templated address over HTTPS with
//! exponential backoff; `StaticTableSource` serves fixtures under test and
//! counts fetches so retrieval behavior is observable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Duration};
use url::Url;

use crate::config::Config;
use crate::error::DashboardError;
use crate::logging::{log, obj, v_str, Domain, Level};

#[async_trait]
pub trait TableSource: Send + Sync {
    /// Fetch the raw table text for one geography.
    async fn fetch_table(&self, geography: &str) -> Result<String, DashboardError>;
}

/// Retry configuration
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.3,
        }
    }
}

impl RetryConfig {
    /// Calculate delay with exponential backoff and jitter
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor;
        let jitter: f64 = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_delay = (clamped + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

/// Retry a fallible async fetch with exponential backoff
pub async fn retry_fetch<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, DashboardError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DashboardError>>,
{
    let mut last_error: Option<DashboardError> = None;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt < config.max_retries {
                    let delay = config.delay_for_attempt(attempt);
                    log(
                        Level::Warn,
                        Domain::Fetch,
                        "retry",
                        obj(&[
                            ("operation", v_str(operation_name)),
                            ("attempt", serde_json::json!(attempt + 1)),
                            ("error", v_str(&e.to_string())),
                            ("delay_ms", serde_json::json!(delay.as_millis() as u64)),
                        ]),
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| DashboardError::fetch(operation_name, "retry exhausted without error")))
}

/// Categorize HTTP statuses for retry decisions
pub fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        408 |   // Request Timeout
        429 |   // Too Many Requests
        500 |   // Internal Server Error
        502 |   // Bad Gateway
        503 |   // Service Unavailable
        504 // Gateway Timeout
    )
}

/// Fetches the table from the templated blob address.
pub struct HttpTableSource {
    client: reqwest::Client,
    base: Url,
    prefix: String,
    ext: String,
    retry: RetryConfig,
}

impl HttpTableSource {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(&cfg.source_base)?,
            prefix: cfg.source_prefix.clone(),
            ext: cfg.source_ext.clone(),
            retry: RetryConfig::default(),
        })
    }

    /// `{base}{prefix}{geography}{ext}`
    pub fn table_url(&self, geography: &str) -> Result<Url, DashboardError> {
        self.base
            .join(&format!("{}{}{}", self.prefix, geography, self.ext))
            .map_err(|e| DashboardError::fetch(geography, e))
    }

    async fn fetch_once(&self, geography: &str) -> Result<String, DashboardError> {
        let url = self.table_url(geography)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::fetch(geography, e))?;
        let status = response.status();
        if !status.is_success() {
            log(
                Level::Debug,
                Domain::Fetch,
                "bad_status",
                obj(&[
                    ("geography", v_str(geography)),
                    ("status", serde_json::json!(status.as_u16())),
                    (
                        "retryable",
                        serde_json::json!(is_retryable_status(status.as_u16())),
                    ),
                ]),
            );
            return Err(DashboardError::fetch(
                geography,
                format!("status {}", status.as_u16()),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| DashboardError::fetch(geography, e))
    }
}

#[async_trait]
impl TableSource for HttpTableSource {
    async fn fetch_table(&self, geography: &str) -> Result<String, DashboardError> {
        retry_fetch(&self.retry, "fetch_table", || self.fetch_once(geography)).await
    }
}

/// In-memory source for tests: geography → table text, with a fetch counter.
#[derive(Default)]
pub struct StaticTableSource {
    tables: HashMap<String, String>,
    fetches: AtomicU64,
}

impl StaticTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, geography: &str, text: &str) -> Self {
        self.tables.insert(geography.to_string(), text.to_string());
        self
    }

    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableSource for StaticTableSource {
    async fn fetch_table(&self, geography: &str) -> Result<String, DashboardError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(geography)
            .cloned()
            .ok_or_else(|| DashboardError::fetch(geography, "no table for geography"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_calculation() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.0, // no jitter for deterministic test
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000)); // clamped
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }

    #[test]
    fn table_url_substitutes_geography() {
        let source = HttpTableSource::new(&Config::default()).unwrap();
        let url = source.table_url("E08000026").unwrap();
        assert!(url
            .as_str()
            .ends_with("/population-aging-app/test_activity_E08000026.csv"));
    }

    #[tokio::test]
    async fn retry_eventual_success() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1, // fast for test
            ..Default::default()
        };

        let counter = std::sync::Arc::new(AtomicU64::new(0));
        let counter_clone = counter.clone();

        let result = retry_fetch(&config, "test", || {
            let c = counter_clone.clone();
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(DashboardError::fetch("test", "not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn static_source_counts_fetches() {
        let source = StaticTableSource::new().with_table("E08000026", "pod,hsagrp\n");
        assert!(source.fetch_table("E08000026").await.is_ok());
        assert!(source.fetch_table("E07000001").await.is_err());
        assert_eq!(source.fetches(), 2);
    }
}
