//! Market data fetching
//!
//! One adapter per public provider, all behind [`MarketDataProvider`]. The
//! [`MarketDataFetcher`] walks the configured providers in order and returns
//! the first usable answer.

pub mod binance;
pub mod coinbase;
pub mod coingecko;
pub mod cryptocompare;
pub mod kraken;

#[cfg(test)]
mod tests;

pub use binance::BinanceClient;
pub use coinbase::CoinbaseClient;
pub use coingecko::CoinGeckoClient;
pub use cryptocompare::CryptoCompareClient;
pub use kraken::KrakenClient;

use crate::config::FetcherConfig;
use crate::error::{BotError, ProviderError, Result};
use crate::types::{MarketSnapshot, PriceSeries, ProviderKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Funding fields of a perpetual contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingInfo {
    pub funding_rate: Decimal,
    pub next_funding_time: Option<DateTime<Utc>>,
    pub open_interest: Option<Decimal>,
}

/// A public market data source for BTC.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Current price and 24h volume, plus funding if the venue publishes it.
    async fn fetch_snapshot(&self) -> std::result::Result<MarketSnapshot, ProviderError>;

    /// Funding data for the BTC perpetual.
    async fn fetch_funding(&self) -> std::result::Result<FundingInfo, ProviderError> {
        Err(ProviderError::Unsupported("funding"))
    }

    /// Up to `limit` hourly observations, oldest first.
    async fn fetch_history(&self, limit: usize) -> std::result::Result<PriceSeries, ProviderError>;
}

/// Tries providers in configured order until one succeeds.
#[derive(Clone)]
pub struct MarketDataFetcher {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    attempt_timeout: Duration,
    /// Bound on a whole snapshot request, funding fill-in included
    snapshot_budget: Duration,
}

impl MarketDataFetcher {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>, attempt_timeout: Duration) -> Self {
        let snapshot_budget = attempt_timeout * providers.len() as u32;
        Self {
            providers,
            attempt_timeout,
            snapshot_budget,
        }
    }

    pub fn with_snapshot_budget(mut self, budget: Duration) -> Self {
        self.snapshot_budget = budget;
        self
    }

    /// Build the adapters named in the config, sharing one HTTP client.
    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.provider_timeout())
            .user_agent(concat!("btc-perp-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let providers = config
            .providers
            .iter()
            .map(|kind| provider_for(*kind, http.clone()))
            .collect();

        // Finish the snapshot at least one attempt before the cycle deadline
        let budget = config.cycle_timeout().saturating_sub(config.provider_timeout());
        Ok(Self::new(providers, config.provider_timeout()).with_snapshot_budget(budget))
    }

    pub fn provider_kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// Current market snapshot from the first provider that answers.
    ///
    /// When that provider has no funding data, the other providers are asked
    /// for it; if nobody has it the field stays empty. Providers that timed
    /// out or refused us during this request are not asked again, and the
    /// fill-in stops once the snapshot budget is spent.
    pub async fn fetch_snapshot(&self) -> Result<MarketSnapshot> {
        let deadline = Instant::now() + self.snapshot_budget;
        let mut tried = Vec::with_capacity(self.providers.len());
        let mut failures = Vec::new();
        let mut unreachable = Vec::new();

        for provider in &self.providers {
            let kind = provider.kind();
            tried.push(kind);
            debug!("Trying {} for market snapshot", kind);

            let outcome = self
                .attempt(provider.fetch_snapshot())
                .await
                .and_then(validate_snapshot);

            match outcome {
                Ok(mut snapshot) => {
                    info!("{} snapshot: ${:.2}", kind, snapshot.price);
                    if snapshot.funding_rate.is_none() {
                        self.fill_funding(&mut snapshot, &unreachable, deadline).await;
                    }
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!("{} snapshot failed: {}", kind, e);
                    if matches!(e, ProviderError::Timeout(_) | ProviderError::Restricted { .. }) {
                        unreachable.push(kind);
                    }
                    failures.push((kind, e.to_string()));
                }
            }
        }

        Err(BotError::DataUnavailable { tried, failures })
    }

    /// Hourly history from the first provider returning at least `min_len`
    /// points, truncated to `limit`.
    ///
    /// If every provider fails or comes up short, the longest short series is
    /// returned so the caller can report how much data there was.
    pub async fn fetch_series(&self, min_len: usize, limit: usize) -> Result<PriceSeries> {
        let mut tried = Vec::with_capacity(self.providers.len());
        let mut failures = Vec::new();
        let mut best_partial: Option<PriceSeries> = None;

        for provider in &self.providers {
            let kind = provider.kind();
            tried.push(kind);

            match self.attempt(provider.fetch_history(limit)).await {
                Ok(series) if series.len() >= min_len => {
                    info!("{} history: {} points", kind, series.len());
                    return Ok(series.truncate_to_latest(limit));
                }
                Ok(series) => {
                    warn!("{} history too short: {} < {}", kind, series.len(), min_len);
                    failures.push((kind, format!("only {} points", series.len())));
                    if !series.is_empty() && best_partial.as_ref().map_or(true, |b| series.len() > b.len()) {
                        best_partial = Some(series);
                    }
                }
                Err(ProviderError::Unsupported(what)) => {
                    debug!("{} has no {}", kind, what);
                    failures.push((kind, format!("{} not supported", what)));
                }
                Err(e) => {
                    warn!("{} history failed: {}", kind, e);
                    failures.push((kind, e.to_string()));
                }
            }
        }

        best_partial.ok_or(BotError::DataUnavailable { tried, failures })
    }

    async fn fill_funding(&self, snapshot: &mut MarketSnapshot, skip: &[ProviderKind], deadline: Instant) {
        for provider in &self.providers {
            let kind = provider.kind();
            if skip.contains(&kind) {
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Snapshot budget spent before a funding rate was found");
                return;
            }
            match self.attempt_within(remaining.min(self.attempt_timeout), provider.fetch_funding()).await {
                Ok(funding) => {
                    debug!("{} funding rate: {}", kind, funding.funding_rate);
                    snapshot.funding_rate = Some(funding.funding_rate);
                    snapshot.next_funding_time = funding.next_funding_time;
                    snapshot.open_interest = funding.open_interest.or(snapshot.open_interest);
                    snapshot.funding_source = Some(kind);
                    return;
                }
                Err(ProviderError::Unsupported(_)) => {}
                Err(e) => warn!("{} funding failed: {}", kind, e),
            }
        }
        warn!("No provider returned a funding rate");
    }

    async fn attempt<T, F>(&self, call: F) -> std::result::Result<T, ProviderError>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        self.attempt_within(self.attempt_timeout, call).await
    }

    async fn attempt_within<T, F>(&self, limit: Duration, call: F) -> std::result::Result<T, ProviderError>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(limit)),
        }
    }
}

fn provider_for(kind: ProviderKind, http: Client) -> Arc<dyn MarketDataProvider> {
    match kind {
        ProviderKind::Binance => Arc::new(BinanceClient::new(http)),
        ProviderKind::Coinbase => Arc::new(CoinbaseClient::new(http)),
        ProviderKind::Kraken => Arc::new(KrakenClient::new(http)),
        ProviderKind::CryptoCompare => Arc::new(CryptoCompareClient::new(http)),
        ProviderKind::CoinGecko => Arc::new(CoinGeckoClient::new(http)),
    }
}

fn validate_snapshot(snapshot: MarketSnapshot) -> std::result::Result<MarketSnapshot, ProviderError> {
    if snapshot.price <= Decimal::ZERO {
        return Err(ProviderError::Malformed(format!("non-positive price {}", snapshot.price)));
    }
    if snapshot.volume_24h < Decimal::ZERO {
        return Err(ProviderError::Malformed(format!("negative volume {}", snapshot.volume_24h)));
    }
    Ok(snapshot)
}

const GEO_BLOCK_MARKERS: &[&str] = &[
    "restricted location",
    "not available in your country",
    "region not supported",
    "eligibility",
];

/// GET `url` and decode the JSON body, mapping failures to [`ProviderError`].
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> std::result::Result<T, ProviderError> {
    let response = http.get(url).query(query).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let code = status.as_u16();
        if is_restricted(code, &body) {
            return Err(ProviderError::Restricted { status: code });
        }
        return Err(ProviderError::Status {
            status: code,
            body: body.chars().take(200).collect(),
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
}

pub(crate) fn is_restricted(status: u16, body: &str) -> bool {
    if matches!(status, 401 | 403 | 451) {
        return true;
    }
    let lower = body.to_lowercase();
    GEO_BLOCK_MARKERS.iter().any(|m| lower.contains(m))
}

/// Parse a decimal that providers send as a JSON string.
pub(crate) fn parse_decimal(field: &str, raw: &str) -> std::result::Result<Decimal, ProviderError> {
    raw.trim()
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|_| ProviderError::Malformed(format!("{}: not a number: {:?}", field, raw)))
}

/// Convert a JSON float to a decimal.
pub(crate) fn decimal_from_f64(field: &str, value: f64) -> std::result::Result<Decimal, ProviderError> {
    Decimal::try_from(value).map_err(|_| ProviderError::Malformed(format!("{}: not representable: {}", field, value)))
}

pub(crate) fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

pub(crate) fn secs_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
