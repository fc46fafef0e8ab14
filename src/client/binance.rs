//! Binance USDⓈ-M futures adapter
//!
//! The only provider here with funding rate and open interest.

use super::{get_json, millis_to_utc, parse_decimal, FundingInfo, MarketDataProvider};
use crate::error::ProviderError;
use crate::types::{MarketSnapshot, PricePoint, PriceSeries, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const BASE_URL: &str = "https://fapi.binance.com/fapi/v1";
const SYMBOL: &str = "BTCUSDT";

pub struct BinanceClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Ticker24h {
    last_price: String,
    quote_volume: String,
    price_change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PremiumIndex {
    last_funding_rate: String,
    next_funding_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInterest {
    open_interest: String,
}

impl BinanceClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, BASE_URL)
    }

    pub fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn open_interest(&self) -> Result<OpenInterest, ProviderError> {
        let url = format!("{}/openInterest", self.base_url);
        get_json(&self.http, &url, &[("symbol", SYMBOL)]).await
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Binance
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, ProviderError> {
        let url = format!("{}/ticker/24hr", self.base_url);
        let (ticker, funding) = tokio::join!(
            get_json::<Ticker24h>(&self.http, &url, &[("symbol", SYMBOL)]),
            self.fetch_funding(),
        );

        let mut snapshot = parse_ticker(ticker?)?;
        match funding {
            Ok(funding) => {
                snapshot.funding_rate = Some(funding.funding_rate);
                snapshot.next_funding_time = funding.next_funding_time;
                snapshot.open_interest = funding.open_interest;
            }
            // Price is still good; the fetcher will look elsewhere for funding.
            Err(e) => debug!("Binance funding unavailable: {}", e),
        }
        Ok(snapshot)
    }

    async fn fetch_funding(&self) -> Result<FundingInfo, ProviderError> {
        let url = format!("{}/premiumIndex", self.base_url);
        let (premium, open_interest) = tokio::join!(
            get_json::<PremiumIndex>(&self.http, &url, &[("symbol", SYMBOL)]),
            self.open_interest(),
        );

        let mut info = parse_premium_index(premium?)?;
        info.open_interest = open_interest
            .ok()
            .and_then(|oi| parse_decimal("openInterest", &oi.open_interest).ok());
        Ok(info)
    }

    async fn fetch_history(&self, limit: usize) -> Result<PriceSeries, ProviderError> {
        let url = format!("{}/klines", self.base_url);
        let limit = limit.min(1500).to_string();
        let rows: Vec<Vec<Value>> = get_json(
            &self.http,
            &url,
            &[("symbol", SYMBOL), ("interval", "1h"), ("limit", &limit)],
        )
        .await?;
        parse_klines(&rows)
    }
}

pub(crate) fn parse_ticker(ticker: Ticker24h) -> Result<MarketSnapshot, ProviderError> {
    let price = parse_decimal("lastPrice", &ticker.last_price)?;
    let volume = parse_decimal("quoteVolume", &ticker.quote_volume)?;

    let mut snapshot = MarketSnapshot::new(ProviderKind::Binance, price, volume);
    snapshot.price_change_24h_pct = ticker
        .price_change_percent
        .as_deref()
        .and_then(|raw| parse_decimal("priceChangePercent", raw).ok());
    Ok(snapshot)
}

pub(crate) fn parse_premium_index(premium: PremiumIndex) -> Result<FundingInfo, ProviderError> {
    Ok(FundingInfo {
        funding_rate: parse_decimal("lastFundingRate", &premium.last_funding_rate)?,
        next_funding_time: premium.next_funding_time.and_then(millis_to_utc),
        open_interest: None,
    })
}

/// Kline rows: `[open_time, open, high, low, close, volume, close_time, ...]`
pub(crate) fn parse_klines(rows: &[Vec<Value>]) -> Result<PriceSeries, ProviderError> {
    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let open_time = row
            .first()
            .and_then(Value::as_i64)
            .and_then(millis_to_utc)
            .ok_or_else(|| ProviderError::Malformed("kline open time".to_string()))?;
        let close = row
            .get(4)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("kline close".to_string()))?;
        let volume = row
            .get(5)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("kline volume".to_string()))?;

        points.push(PricePoint {
            timestamp: open_time,
            close: parse_decimal("close", close)?,
            volume: parse_decimal("volume", volume)?,
        });
    }
    Ok(PriceSeries::new(points))
}
