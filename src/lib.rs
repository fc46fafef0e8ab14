//! Bitcoin Perpetual Futures Signal Bot
//!
//! Fetches BTC market data from public providers, computes technical
//! indicators and runs four independent strategies. Signals are informational
//! only; nothing here places orders.
//!
//! ## Architecture
//!
//! ```text
//! Providers (Binance → Coinbase → Kraken → CryptoCompare → CoinGecko)
//!      ↓ MarketDataFetcher (first success wins)
//! IndicatorCalculator (Bollinger, RSI, z-score, volatility, volume)
//!      ↓
//! Strategies (Momentum, Mean Reversion, Funding Arbitrage, Liquidation Hunt)
//!      ↓ aggregate
//! AnalysisResult → Telegram / CLI
//! ```

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod strategy;
pub mod telegram;
pub mod types;

#[cfg(test)]
mod types_tests;
