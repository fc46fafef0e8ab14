//! CryptoCompare adapter (aggregated spot index, no funding)

use super::{decimal_from_f64, get_json, secs_to_utc, MarketDataProvider};
use crate::error::ProviderError;
use crate::types::{MarketSnapshot, PricePoint, PriceSeries, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

const BASE_URL: &str = "https://min-api.cryptocompare.com/data";

pub struct CryptoCompareClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriceMultiFull {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) struct RawQuote {
    price: f64,
    #[serde(rename = "VOLUME24HOURTO")]
    volume_24h_to: f64,
    #[serde(rename = "CHANGEPCT24HOUR")]
    change_pct_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoHour {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data")]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoBar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoBar {
    time: i64,
    close: f64,
    volumeto: f64,
}

impl CryptoCompareClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CryptoCompareClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CryptoCompare
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/pricemultifull", self.base_url);
        let body: PriceMultiFull = get_json(&self.http, &url, &[("fsyms", "BTC"), ("tsyms", "USD")]).await?;
        parse_price_multi_full(body)
    }

    async fn fetch_history(&self, limit: usize) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/v2/histohour", self.base_url);
        // The endpoint returns limit + 1 bars
        let limit = limit.saturating_sub(1).clamp(1, 2000).to_string();
        let body: HistoHour = get_json(
            &self.http,
            &url,
            &[("fsym", "BTC"), ("tsym", "USD"), ("limit", &limit)],
        )
        .await?;
        parse_histohour(body)
    }
}

pub(crate) fn parse_price_multi_full(mut body: PriceMultiFull) -> Result<MarketSnapshot, ProviderError> {
    let quote = body
        .raw
        .remove("BTC")
        .and_then(|mut by_quote| by_quote.remove("USD"))
        .ok_or_else(|| ProviderError::Malformed("missing RAW.BTC.USD".to_string()))?;

    let mut snapshot = MarketSnapshot::new(
        ProviderKind::CryptoCompare,
        decimal_from_f64("PRICE", quote.price)?,
        decimal_from_f64("VOLUME24HOURTO", quote.volume_24h_to)?,
    );
    snapshot.price_change_24h_pct = quote
        .change_pct_24h
        .and_then(|pct| decimal_from_f64("CHANGEPCT24HOUR", pct).ok());
    Ok(snapshot)
}

pub(crate) fn parse_histohour(body: HistoHour) -> Result<PriceSeries, ProviderError> {
    if body.response != "Success" {
        return Err(ProviderError::Malformed(format!("{}: {}", body.response, body.message)));
    }
    let bars = body.data.map(|d| d.data).unwrap_or_default();

    let mut points = Vec::with_capacity(bars.len());
    for bar in bars {
        // Bars before the pair existed come back zeroed
        if bar.close <= 0.0 {
            continue;
        }
        points.push(PricePoint {
            timestamp: secs_to_utc(bar.time)
                .ok_or_else(|| ProviderError::Malformed(format!("bar time {}", bar.time)))?,
            close: decimal_from_f64("close", bar.close)?,
            volume: decimal_from_f64("volumeto", bar.volumeto)?,
        });
    }
    Ok(PriceSeries::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_multi_full() {
        let json = r#"{"RAW":{"BTC":{"USD":{"TYPE":"5","PRICE":67000.5,"VOLUME24HOURTO":1250000000.0,"CHANGEPCT24HOUR":-1.25}}}}"#;
        let body: PriceMultiFull = serde_json::from_str(json).unwrap();
        let snapshot = parse_price_multi_full(body).unwrap();

        assert_eq!(snapshot.source, ProviderKind::CryptoCompare);
        assert_eq!(snapshot.price, dec!(67000.5));
        assert_eq!(snapshot.volume_24h, dec!(1250000000));
        assert_eq!(snapshot.price_change_24h_pct, Some(dec!(-1.25)));
    }

    #[test]
    fn test_missing_raw_is_malformed() {
        let body: PriceMultiFull = serde_json::from_str(r#"{"Response":"Error"}"#).unwrap();
        assert!(matches!(parse_price_multi_full(body), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_parse_histohour_skips_empty_bars() {
        let json = r#"{
            "Response": "Success",
            "Message": "",
            "Data": {"Data": [
                {"time": 1718038800, "close": 0, "volumeto": 0},
                {"time": 1718042400, "close": 67050.5, "volumeto": 1000.0},
                {"time": 1718046000, "close": 67180.0, "volumeto": 900.0}
            ]}
        }"#;
        let body: HistoHour = serde_json::from_str(json).unwrap();
        let series = parse_histohour(body).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_parse_histohour_error_response() {
        let json = r#"{"Response": "Error", "Message": "rate limit", "Data": {}}"#;
        let body: HistoHour = serde_json::from_str(json).unwrap();
        let err = parse_histohour(body).unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }
}
