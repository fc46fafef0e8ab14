//! Fallback behaviour of the market data fetcher

use super::*;
use crate::types::PricePoint;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

fn snapshot(kind: ProviderKind, price: Decimal) -> MarketSnapshot {
    MarketSnapshot::new(kind, price, dec!(1000000))
}

fn series(len: usize) -> PriceSeries {
    let start = Utc::now() - ChronoDuration::hours(len as i64);
    PriceSeries::new(
        (0..len)
            .map(|i| PricePoint {
                timestamp: start + ChronoDuration::hours(i as i64),
                close: dec!(60000) + Decimal::from(i),
                volume: dec!(10),
            })
            .collect(),
    )
}

fn failing(kind: ProviderKind) -> MockMarketDataProvider {
    let mut mock = MockMarketDataProvider::new();
    mock.expect_kind().return_const(kind);
    mock.expect_fetch_snapshot()
        .returning(|| Err(ProviderError::Status { status: 500, body: "boom".to_string() }));
    mock.expect_fetch_funding()
        .returning(|| Err(ProviderError::Unsupported("funding")));
    mock.expect_fetch_history()
        .returning(|_| Err(ProviderError::Malformed("bad json".to_string())));
    mock
}

fn working(kind: ProviderKind, price: Decimal) -> MockMarketDataProvider {
    let mut mock = MockMarketDataProvider::new();
    mock.expect_kind().return_const(kind);
    mock.expect_fetch_snapshot()
        .returning(move || Ok(snapshot(kind, price)));
    mock.expect_fetch_funding()
        .returning(|| Err(ProviderError::Unsupported("funding")));
    mock.expect_fetch_history()
        .returning(|limit| Ok(series(limit)));
    mock
}

fn fetcher(providers: Vec<MockMarketDataProvider>) -> MarketDataFetcher {
    let providers = providers
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn MarketDataProvider>)
        .collect();
    MarketDataFetcher::new(providers, Duration::from_secs(5))
}

#[tokio::test]
async fn test_first_provider_wins() {
    let mut second = MockMarketDataProvider::new();
    second.expect_kind().return_const(ProviderKind::Kraken);
    second.expect_fetch_snapshot().never();
    second.expect_fetch_funding()
        .returning(|| Err(ProviderError::Unsupported("funding")));

    let fetcher = fetcher(vec![working(ProviderKind::Coinbase, dec!(65000)), second]);
    let snap = fetcher.fetch_snapshot().await.unwrap();

    assert_eq!(snap.source, ProviderKind::Coinbase);
    assert_eq!(snap.price, dec!(65000));
}

#[tokio::test]
async fn test_falls_through_to_last_provider() {
    let fetcher = fetcher(vec![
        failing(ProviderKind::Binance),
        failing(ProviderKind::Coinbase),
        working(ProviderKind::CoinGecko, dec!(64000)),
    ]);

    let snap = fetcher.fetch_snapshot().await.unwrap();
    assert_eq!(snap.source, ProviderKind::CoinGecko);
    assert_eq!(snap.price, dec!(64000));
    assert!(snap.funding_rate.is_none(), "funding must stay absent, not invented");
}

#[tokio::test]
async fn test_all_failing_names_every_provider() {
    let kinds = [ProviderKind::Binance, ProviderKind::Kraken, ProviderKind::CryptoCompare];
    let fetcher = fetcher(kinds.iter().map(|k| failing(*k)).collect());

    match fetcher.fetch_snapshot().await {
        Err(BotError::DataUnavailable { tried, failures }) => {
            assert_eq!(tried, kinds.to_vec());
            assert_eq!(failures.len(), 3);
        }
        other => panic!("expected DataUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_data_unavailable_message_lists_providers() {
    let fetcher = fetcher(vec![failing(ProviderKind::Binance), failing(ProviderKind::Kraken)]);
    let err = fetcher.fetch_snapshot().await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Binance"));
    assert!(msg.contains("Kraken"));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_zero_price_is_rejected() {
    let fetcher = fetcher(vec![
        working(ProviderKind::Kraken, Decimal::ZERO),
        working(ProviderKind::Coinbase, dec!(66000)),
    ]);
    let snap = fetcher.fetch_snapshot().await.unwrap();
    assert_eq!(snap.source, ProviderKind::Coinbase);
}

#[tokio::test]
async fn test_funding_filled_from_other_provider() {
    let mut binance = MockMarketDataProvider::new();
    binance.expect_kind().return_const(ProviderKind::Binance);
    // Spot ticker down while the futures endpoint still answers
    binance.expect_fetch_snapshot()
        .returning(|| Err(ProviderError::Status { status: 503, body: "maintenance".to_string() }));
    binance.expect_fetch_funding().returning(|| {
        Ok(FundingInfo {
            funding_rate: dec!(0.0003),
            next_funding_time: None,
            open_interest: Some(dec!(80000)),
        })
    });

    let fetcher = fetcher(vec![binance, working(ProviderKind::Kraken, dec!(66000))]);
    let snap = fetcher.fetch_snapshot().await.unwrap();

    assert_eq!(snap.source, ProviderKind::Kraken);
    assert_eq!(snap.funding_rate, Some(dec!(0.0003)));
    assert_eq!(snap.funding_source, Some(ProviderKind::Binance));
    assert_eq!(snap.open_interest, Some(dec!(80000)));
}

#[derive(Default)]
struct SlowProvider {
    funding_calls: AtomicUsize,
}

#[async_trait]
impl MarketDataProvider for SlowProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Binance
    }

    async fn fetch_snapshot(&self) -> std::result::Result<MarketSnapshot, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(snapshot(ProviderKind::Binance, dec!(1)))
    }

    async fn fetch_funding(&self) -> std::result::Result<FundingInfo, ProviderError> {
        self.funding_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::Unsupported("funding"))
    }

    async fn fetch_history(&self, _limit: usize) -> std::result::Result<PriceSeries, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(series(100))
    }
}

#[tokio::test(start_paused = true)]
async fn test_stuck_provider_times_out_and_falls_through() {
    let slow = Arc::new(SlowProvider::default());
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
        slow.clone(),
        Arc::new(working(ProviderKind::Kraken, dec!(66000))),
    ];
    let fetcher = MarketDataFetcher::new(providers, Duration::from_secs(5));

    let started = Instant::now();
    let snap = fetcher.fetch_snapshot().await.unwrap();
    assert_eq!(snap.source, ProviderKind::Kraken);
    assert!(snap.funding_rate.is_none());
    // The provider that timed out is not asked again for funding
    assert_eq!(slow.funding_calls.load(Ordering::SeqCst), 0);
    assert!(started.elapsed() < Duration::from_secs(6));

    let history = fetcher.fetch_series(20, 50).await.unwrap();
    assert_eq!(history.len(), 50);
}

#[tokio::test]
async fn test_restricted_provider_not_asked_for_funding() {
    let mut blocked = MockMarketDataProvider::new();
    blocked.expect_kind().return_const(ProviderKind::Binance);
    blocked.expect_fetch_snapshot()
        .returning(|| Err(ProviderError::Restricted { status: 451 }));
    blocked.expect_fetch_funding().never();

    let fetcher = fetcher(vec![blocked, working(ProviderKind::Coinbase, dec!(66000))]);
    let snap = fetcher.fetch_snapshot().await.unwrap();
    assert_eq!(snap.source, ProviderKind::Coinbase);
    assert!(snap.funding_rate.is_none());
}

struct StuckFunding(ProviderKind);

#[async_trait]
impl MarketDataProvider for StuckFunding {
    fn kind(&self) -> ProviderKind {
        self.0
    }

    async fn fetch_snapshot(&self) -> std::result::Result<MarketSnapshot, ProviderError> {
        Err(ProviderError::Status { status: 502, body: String::new() })
    }

    async fn fetch_funding(&self) -> std::result::Result<FundingInfo, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::Unsupported("funding"))
    }

    async fn fetch_history(&self, _limit: usize) -> std::result::Result<PriceSeries, ProviderError> {
        Err(ProviderError::Unsupported("history"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_funding_fill_in_stops_at_snapshot_budget() {
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
        Arc::new(StuckFunding(ProviderKind::Binance)),
        Arc::new(StuckFunding(ProviderKind::CryptoCompare)),
        Arc::new(StuckFunding(ProviderKind::Coinbase)),
        Arc::new(working(ProviderKind::Kraken, dec!(66000))),
    ];
    let fetcher = MarketDataFetcher::new(providers, Duration::from_secs(5))
        .with_snapshot_budget(Duration::from_secs(7));

    let started = Instant::now();
    let snap = fetcher.fetch_snapshot().await.unwrap();

    // 5s on the first stuck funding call, the last 2s on the second, none left for the third
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8), "{:?}", elapsed);
    assert_eq!(snap.source, ProviderKind::Kraken);
    assert!(snap.funding_rate.is_none());
}

#[tokio::test]
async fn test_series_skips_short_history() {
    let mut short = MockMarketDataProvider::new();
    short.expect_kind().return_const(ProviderKind::CoinGecko);
    short.expect_fetch_history().returning(|_| Ok(series(5)));

    let fetcher = fetcher(vec![short, working(ProviderKind::Kraken, dec!(1))]);
    let history = fetcher.fetch_series(20, 100).await.unwrap();
    assert_eq!(history.len(), 100);
}

#[tokio::test]
async fn test_series_returns_longest_partial_when_nothing_is_long_enough() {
    let mut a = MockMarketDataProvider::new();
    a.expect_kind().return_const(ProviderKind::CoinGecko);
    a.expect_fetch_history().returning(|_| Ok(series(5)));
    let mut b = MockMarketDataProvider::new();
    b.expect_kind().return_const(ProviderKind::Kraken);
    b.expect_fetch_history().returning(|_| Ok(series(8)));

    let fetcher = fetcher(vec![a, b, failing(ProviderKind::Binance)]);
    let history = fetcher.fetch_series(20, 100).await.unwrap();
    assert_eq!(history.len(), 8);
}

#[tokio::test]
async fn test_series_all_failing() {
    let fetcher = fetcher(vec![failing(ProviderKind::Binance), failing(ProviderKind::Coinbase)]);
    let err = fetcher.fetch_series(20, 100).await.unwrap_err();
    assert!(matches!(err, BotError::DataUnavailable { ref tried, .. } if tried.len() == 2));
}

#[test]
fn test_restricted_detection() {
    assert!(is_restricted(451, ""));
    assert!(is_restricted(403, ""));
    assert!(is_restricted(400, "Service unavailable from a restricted location"));
    assert!(!is_restricted(500, "internal error"));
}

#[test]
fn test_parse_decimal_scientific() {
    assert_eq!(parse_decimal("x", "1e-4").unwrap(), dec!(0.0001));
    assert_eq!(parse_decimal("x", " 42.5 ").unwrap(), dec!(42.5));
    assert!(parse_decimal("x", "abc").is_err());
}
