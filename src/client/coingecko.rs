//! CoinGecko adapter (aggregated spot, no funding)

use super::{decimal_from_f64, get_json, millis_to_utc, MarketDataProvider};
use crate::error::ProviderError;
use crate::types::{MarketSnapshot, PricePoint, PriceSeries, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SimplePrice {
    usd: f64,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// `market_chart`: `[ms, price]` pairs. The endpoint's `total_volumes` are
/// rolling 24h totals, not per-bar volume, and are not read.
#[derive(Debug, Deserialize)]
pub(crate) struct MarketChart {
    prices: Vec<[f64; 2]>,
}

impl CoinGeckoClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CoinGecko
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/simple/price", self.base_url);
        let body: HashMap<String, SimplePrice> = get_json(
            &self.http,
            &url,
            &[
                ("ids", "bitcoin"),
                ("vs_currencies", "usd"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ],
        )
        .await?;
        parse_simple_price(body)
    }

    async fn fetch_history(&self, limit: usize) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/coins/bitcoin/market_chart", self.base_url);
        // 2..=90 days gives hourly granularity
        let days = limit.div_ceil(24).clamp(2, 90).to_string();
        let chart: MarketChart = get_json(&self.http, &url, &[("vs_currency", "usd"), ("days", &days)]).await?;
        Ok(parse_market_chart(chart)?.truncate_to_latest(limit))
    }
}

pub(crate) fn parse_simple_price(mut body: HashMap<String, SimplePrice>) -> Result<MarketSnapshot, ProviderError> {
    let quote = body
        .remove("bitcoin")
        .ok_or_else(|| ProviderError::Malformed("missing bitcoin".to_string()))?;

    let volume = match quote.usd_24h_vol {
        Some(v) => decimal_from_f64("usd_24h_vol", v)?,
        None => return Err(ProviderError::Malformed("missing usd_24h_vol".to_string())),
    };
    let mut snapshot = MarketSnapshot::new(ProviderKind::CoinGecko, decimal_from_f64("usd", quote.usd)?, volume);
    snapshot.price_change_24h_pct = quote
        .usd_24h_change
        .and_then(|pct| decimal_from_f64("usd_24h_change", pct).ok());
    Ok(snapshot)
}

/// Bars carry zero volume, so a CoinGecko history yields no volume ratio.
pub(crate) fn parse_market_chart(chart: MarketChart) -> Result<PriceSeries, ProviderError> {
    let mut points = Vec::with_capacity(chart.prices.len());
    for [ts, price] in &chart.prices {
        let ms = *ts as i64;
        points.push(PricePoint {
            timestamp: millis_to_utc(ms).ok_or_else(|| ProviderError::Malformed(format!("timestamp {}", ms)))?,
            close: decimal_from_f64("price", *price)?,
            volume: Decimal::ZERO,
        });
    }
    Ok(PriceSeries::new(points))
}
