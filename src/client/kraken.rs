//! Kraken adapter (spot XBT/USD, no funding)

use super::{get_json, parse_decimal, secs_to_utc, MarketDataProvider};
use crate::error::ProviderError;
use crate::types::{MarketSnapshot, PricePoint, PriceSeries, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

const BASE_URL: &str = "https://api.kraken.com/0/public";
const PAIR: &str = "XBTUSD";
const RESULT_KEY: &str = "XXBTZUSD";

pub struct KrakenClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

impl<T> KrakenResponse<T> {
    fn into_result(self) -> Result<T, ProviderError> {
        if !self.error.is_empty() {
            return Err(ProviderError::Malformed(self.error.join("; ")));
        }
        self.result
            .ok_or_else(|| ProviderError::Malformed("missing result".to_string()))
    }
}

/// Ticker entry: `c` = [last price, lot volume], `v` = [volume today, volume 24h]
#[derive(Debug, Deserialize)]
pub(crate) struct TickerInfo {
    c: Vec<String>,
    v: Vec<String>,
}

impl KrakenClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for KrakenClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Kraken
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/Ticker", self.base_url);
        let response: KrakenResponse<HashMap<String, TickerInfo>> =
            get_json(&self.http, &url, &[("pair", PAIR)]).await?;
        parse_ticker(response.into_result()?)
    }

    async fn fetch_history(&self, limit: usize) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/OHLC", self.base_url);
        let response: KrakenResponse<HashMap<String, Value>> =
            get_json(&self.http, &url, &[("pair", PAIR), ("interval", "60")]).await?;
        Ok(parse_ohlc(response.into_result()?)?.truncate_to_latest(limit))
    }
}

pub(crate) fn parse_ticker(mut result: HashMap<String, TickerInfo>) -> Result<MarketSnapshot, ProviderError> {
    let ticker = result
        .remove(RESULT_KEY)
        .ok_or_else(|| ProviderError::Malformed(format!("missing {}", RESULT_KEY)))?;

    let price = ticker
        .c
        .first()
        .ok_or_else(|| ProviderError::Malformed("missing last trade".to_string()))
        .and_then(|raw| parse_decimal("c", raw))?;
    let base_volume = ticker
        .v
        .get(1)
        .ok_or_else(|| ProviderError::Malformed("missing 24h volume".to_string()))
        .and_then(|raw| parse_decimal("v", raw))?;

    Ok(MarketSnapshot::new(ProviderKind::Kraken, price, base_volume * price))
}

/// OHLC rows: `[time, open, high, low, close, vwap, volume, count]`
pub(crate) fn parse_ohlc(mut result: HashMap<String, Value>) -> Result<PriceSeries, ProviderError> {
    let rows = match result.remove(RESULT_KEY) {
        Some(Value::Array(rows)) => rows,
        _ => return Err(ProviderError::Malformed(format!("missing {} candles", RESULT_KEY))),
    };

    let mut points = Vec::with_capacity(rows.len());
    for row in &rows {
        let bad = || ProviderError::Malformed("ohlc row".to_string());
        let timestamp = row.get(0).and_then(Value::as_i64).and_then(secs_to_utc).ok_or_else(bad)?;
        let close = row.get(4).and_then(Value::as_str).ok_or_else(bad)?;
        let volume = row.get(6).and_then(Value::as_str).ok_or_else(bad)?;
        points.push(PricePoint {
            timestamp,
            close: parse_decimal("close", close)?,
            volume: parse_decimal("volume", volume)?,
        });
    }
    Ok(PriceSeries::new(points))
}
