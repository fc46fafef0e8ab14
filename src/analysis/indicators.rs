//! Technical indicators over an hourly close series
//!
//! All math is done in `Decimal`. Standard deviations use the sample (n - 1)
//! estimator, RSI uses Wilder smoothing seeded with a simple mean.

use crate::config::IndicatorConfig;
use crate::error::{BotError, Result};
use crate::types::{Indicators, PriceSeries};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

pub struct IndicatorCalculator {
    config: IndicatorConfig,
}

impl IndicatorCalculator {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn required_observations(&self) -> usize {
        self.config.required_observations()
    }

    /// Computes every indicator from the newest `window` observations (RSI
    /// looks at the whole series).
    ///
    /// Fails with [`BotError::InsufficientData`] rather than computing over a
    /// shorter window.
    pub fn compute(&self, series: &PriceSeries) -> Result<Indicators> {
        let required = self.required_observations();
        if series.len() < required {
            return Err(BotError::InsufficientData {
                required,
                available: series.len(),
            });
        }

        let window = self.config.window;
        let closes = series.closes();
        let volumes = series.volumes();
        let recent = &closes[closes.len() - window..];
        let recent_volumes = &volumes[volumes.len() - window..];
        let latest = recent[window - 1];

        let mid = mean(recent);
        let sd = sample_std_dev(recent);
        let k = self.config.bollinger_k;

        let zscore = if sd.is_zero() {
            Decimal::ZERO
        } else {
            (latest - mid) / sd
        };

        let rsi = wilder_rsi(&closes, self.config.rsi_period).ok_or(BotError::InsufficientData {
            required,
            available: series.len(),
        })?;

        let volatility = sample_std_dev(&simple_returns(recent));
        let annualized_volatility = volatility * sqrt(Decimal::from(self.config.periods_per_year));

        let baseline_volume = mean(recent_volumes);
        let volume_ratio = if baseline_volume > Decimal::ZERO {
            Some(recent_volumes[window - 1] / baseline_volume)
        } else {
            None
        };

        tracing::debug!(
            "indicators: mid={:.2} sd={:.2} rsi={:.1} z={:.2} vol={:.5}",
            mid,
            sd,
            rsi,
            zscore,
            volatility
        );

        Ok(Indicators {
            bollinger_upper: mid + k * sd,
            bollinger_mid: mid,
            bollinger_lower: mid - k * sd,
            rsi,
            zscore,
            volatility,
            annualized_volatility,
            volume_ratio,
            window,
            observations: series.len(),
        })
    }
}

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

/// Sample standard deviation; zero for fewer than two values.
pub fn sample_std_dev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let m = mean(values);
    let sum_sq: Decimal = values.iter().map(|v| (*v - m) * (*v - m)).sum();
    sqrt(sum_sq / Decimal::from(values.len() - 1))
}

/// Period-over-period simple returns. Pairs with a non-positive base are skipped.
pub fn simple_returns(closes: &[Decimal]) -> Vec<Decimal> {
    closes
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Wilder RSI over `closes`. `None` when fewer than `period + 1` closes.
///
/// Returns 100 when there were no losses in the smoothed window, including a
/// perfectly flat series.
pub fn wilder_rsi(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = Decimal::from(period);

    let (seed, rest) = changes.split_at(period);
    let mut avg_gain = seed.iter().map(|c| (*c).max(Decimal::ZERO)).sum::<Decimal>() / p;
    let mut avg_loss = seed.iter().map(|c| (-*c).max(Decimal::ZERO)).sum::<Decimal>() / p;

    for change in rest {
        let gain = (*change).max(Decimal::ZERO);
        let loss = (-*change).max(Decimal::ZERO);
        avg_gain = (avg_gain * (p - Decimal::ONE) + gain) / p;
        avg_loss = (avg_loss * (p - Decimal::ONE) + loss) / p;
    }

    if avg_loss.is_zero() {
        return Some(dec!(100));
    }
    let rs = avg_gain / avg_loss;
    Some(dec!(100) - dec!(100) / (Decimal::ONE + rs))
}

fn sqrt(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).sqrt().unwrap_or(Decimal::ZERO)
}
