//! Central bank key rate lookup
//!
//! [`CbrKeyRateProvider`] calls the Bank of Russia `DailyInfo` SOAP service.
//! [`CachedKeyRateProvider`] wraps any provider and keeps the last value for
//! a fixed time under a single async mutex, so concurrent callers see one
//! consistent rate and at most one request is in flight.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("Key rate request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Key rate service answered HTTP {0}")]
    Status(u16),

    #[error("Malformed key rate response: {0}")]
    Parse(String),

    #[error("Unusable key rate value: {0}")]
    InvalidValue(String),
}

/// Source of the reference rate used to price loans
#[async_trait]
pub trait KeyRateProvider: Send + Sync {
    /// Annual key rate in percent on `date`
    async fn key_rate(&self, date: NaiveDate) -> Result<Decimal, RateError>;
}

/// Rate provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateProviderConfig {
    /// SOAP endpoint
    pub endpoint: String,
    /// Per-request deadline
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// How long a fetched rate is reused
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

impl Default for RateProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://www.cbr.ru/DailyInfoWebServ/DailyInfo.asmx".to_string(),
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

const SOAP_ACTION: &str = "http://web.cbr.ru/KeyRate";

/// SOAP 1.2 client for the Bank of Russia key rate
pub struct CbrKeyRateProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl CbrKeyRateProvider {
    pub fn new(config: &RateProviderConfig) -> Result<Self, RateError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn envelope(date: NaiveDate) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap12:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                 xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                 xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <soap12:Body>
    <KeyRate xmlns="http://web.cbr.ru/">
      <OnDate>{}</OnDate>
    </KeyRate>
  </soap12:Body>
</soap12:Envelope>"#,
            date.format("%Y-%m-%d")
        )
    }
}

/// Extract `Body/KeyRateResponse/KeyRateResult` from a SOAP response
pub fn parse_key_rate_response(xml: &str) -> Result<Decimal, RateError> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| RateError::Parse(e.to_string()))?;

    let body = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "Body")
        .ok_or_else(|| RateError::Parse("Body element not found".to_string()))?;

    let response = body
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "KeyRateResponse")
        .ok_or_else(|| RateError::Parse("KeyRateResponse element not found".to_string()))?;

    let result = response
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "KeyRateResult")
        .ok_or_else(|| RateError::Parse("KeyRateResult element not found".to_string()))?;

    let text = result.text().unwrap_or_default().trim();
    if text.is_empty() {
        return Err(RateError::InvalidValue("empty".to_string()));
    }

    let rate = Decimal::from_str(text).map_err(|e| RateError::InvalidValue(format!("{}: {}", text, e)))?;
    if rate < Decimal::ZERO || rate >= Decimal::ONE_HUNDRED {
        return Err(RateError::InvalidValue(text.to_string()));
    }
    Ok(rate)
}

#[async_trait]
impl KeyRateProvider for CbrKeyRateProvider {
    async fn key_rate(&self, date: NaiveDate) -> Result<Decimal, RateError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(Self::envelope(date))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        tracing::debug!(bytes = body.len(), "Key rate response received");

        parse_key_rate_response(&body)
    }
}

struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// Reuses the last successful rate for `ttl`
pub struct CachedKeyRateProvider {
    inner: Arc<dyn KeyRateProvider>,
    ttl: Duration,
    cached: Mutex<Option<CachedRate>>,
}

impl CachedKeyRateProvider {
    pub fn new(inner: Arc<dyn KeyRateProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl KeyRateProvider for CachedKeyRateProvider {
    async fn key_rate(&self, date: NaiveDate) -> Result<Decimal, RateError> {
        // Held across the fetch so that concurrent misses issue one request
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.rate);
            }
        }

        let rate = self.inner.key_rate(date).await?;
        *cached = Some(CachedRate {
            rate,
            fetched_at: Instant::now(),
        });
        Ok(rate)
    }
}
