//! Coinbase Exchange adapter (spot BTC-USD, no funding)

use super::{decimal_from_f64, get_json, parse_decimal, secs_to_utc, MarketDataProvider};
use crate::error::ProviderError;
use crate::types::{MarketSnapshot, PricePoint, PriceSeries, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

const BASE_URL: &str = "https://api.exchange.coinbase.com";
const PRODUCT: &str = "BTC-USD";
const MAX_CANDLES: usize = 300;

pub struct CoinbaseClient {
    http: Client,
    base_url: String,
}

/// `/products/{id}/stats`; volume is in BTC
#[derive(Debug, Deserialize)]
pub(crate) struct ProductStats {
    open: String,
    last: String,
    volume: String,
}

impl CoinbaseClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CoinbaseClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Coinbase
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/products/{}/stats", self.base_url, PRODUCT);
        let stats: ProductStats = get_json(&self.http, &url, &[]).await?;
        parse_stats(stats)
    }

    async fn fetch_history(&self, limit: usize) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/products/{}/candles", self.base_url, PRODUCT);
        let rows: Vec<[f64; 6]> = get_json(&self.http, &url, &[("granularity", "3600")]).await?;
        let mut series = parse_candles(&rows)?;
        if limit < MAX_CANDLES {
            series = series.truncate_to_latest(limit);
        }
        Ok(series)
    }
}

pub(crate) fn parse_stats(stats: ProductStats) -> Result<MarketSnapshot, ProviderError> {
    let price = parse_decimal("last", &stats.last)?;
    let open = parse_decimal("open", &stats.open)?;
    let base_volume = parse_decimal("volume", &stats.volume)?;

    let mut snapshot = MarketSnapshot::new(ProviderKind::Coinbase, price, base_volume * price);
    if open > Decimal::ZERO {
        snapshot.price_change_24h_pct = Some((price - open) / open * Decimal::ONE_HUNDRED);
    }
    Ok(snapshot)
}

/// Candle rows: `[time, low, high, open, close, volume]`, newest first.
pub(crate) fn parse_candles(rows: &[[f64; 6]]) -> Result<PriceSeries, ProviderError> {
    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let timestamp = secs_to_utc(row[0] as i64)
            .ok_or_else(|| ProviderError::Malformed(format!("candle time {}", row[0])))?;
        points.push(PricePoint {
            timestamp,
            close: decimal_from_f64("close", row[4])?,
            volume: decimal_from_f64("volume", row[5])?,
        });
    }
    Ok(PriceSeries::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_stats() {
        let json = r#"{"open":"100000.00","high":"103000.00","low":"99000.00","last":"102000.00","volume":"1500.5","volume_30day":"50000"}"#;
        let stats: ProductStats = serde_json::from_str(json).unwrap();
        let snapshot = parse_stats(stats).unwrap();

        assert_eq!(snapshot.source, ProviderKind::Coinbase);
        assert_eq!(snapshot.price, dec!(102000));
        assert_eq!(snapshot.volume_24h, dec!(153051000));
        assert_eq!(snapshot.price_change_24h_pct, Some(dec!(2)));
        assert!(snapshot.funding_rate.is_none());
    }

    #[test]
    fn test_parse_candles_sorts_oldest_first() {
        let json = "[[1718046000, 66900.0, 67200.0, 67050.5, 67180.0, 12.5], [1718042400, 66800.0, 67100.0, 67000.0, 67050.5, 10.0]]";
        let rows: Vec<[f64; 6]> = serde_json::from_str(json).unwrap();
        let series = parse_candles(&rows).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![dec!(67050.5), dec!(67180)]);
    }
}
