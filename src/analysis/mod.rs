//! Analysis cycle
//!
//! One cycle fetches a live snapshot and the hourly history, computes
//! indicators, runs every strategy and aggregates the signals. Cycles share
//! no state with each other.

pub mod indicators;


pub use indicators::IndicatorCalculator;

use crate::client::MarketDataFetcher;
use crate::config::Config;
use crate::error::{BotError, Result};
use crate::strategy::{aggregate, StrategySet};
use crate::types::{AnalysisResult, MarketSnapshot};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

pub struct Analyzer {
    fetcher: MarketDataFetcher,
    calculator: IndicatorCalculator,
    strategies: StrategySet,
    history_limit: usize,
    cycle_timeout: Duration,
}

impl Analyzer {
    pub fn new(
        fetcher: MarketDataFetcher,
        calculator: IndicatorCalculator,
        strategies: StrategySet,
        history_limit: usize,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            calculator,
            strategies,
            history_limit,
            cycle_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            MarketDataFetcher::from_config(&config.fetcher)?,
            IndicatorCalculator::new(config.indicators.clone()),
            StrategySet::from_config(&config.strategy, &config.risk),
            config.fetcher.history_limit,
            config.fetcher.cycle_timeout(),
        ))
    }

    /// Runs one full analysis cycle, bounded by the cycle timeout.
    ///
    /// Dropping the returned future abandons any in-flight provider calls.
    pub async fn get_analysis(&self) -> Result<AnalysisResult> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", cycle = %cycle_id);

        async {
            let started = std::time::Instant::now();
            let mut result = tokio::time::timeout(self.cycle_timeout, self.run_cycle())
                .await
                .map_err(|_| BotError::Timeout(self.cycle_timeout))??;
            result.cycle_id = cycle_id;

            let recommended = result
                .recommended()
                .map(|s| format!("{} {}", s.strategy(), s.direction()))
                .unwrap_or_else(|| "none".to_string());
            tracing::info!(
                "analysis done in {:?}: price=${:.2} source={} directional={} recommended={}",
                started.elapsed(),
                result.snapshot.price,
                result.snapshot.source,
                result.directional_signals().count(),
                recommended
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Live snapshot only, for the price and funding commands.
    pub async fn snapshot(&self) -> Result<MarketSnapshot> {
        tokio::time::timeout(self.cycle_timeout, self.fetcher.fetch_snapshot())
            .await
            .map_err(|_| BotError::Timeout(self.cycle_timeout))?
    }

    async fn run_cycle(&self) -> Result<AnalysisResult> {
        let required = self.calculator.required_observations();
        let (snapshot, series) = tokio::try_join!(
            self.fetcher.fetch_snapshot(),
            self.fetcher.fetch_series(required, self.history_limit),
        )?;

        let indicators = self.calculator.compute(&series)?;
        let signals = self.strategies.evaluate_all(&snapshot, &indicators);
        Ok(aggregate(snapshot, indicators, signals))
    }
}
