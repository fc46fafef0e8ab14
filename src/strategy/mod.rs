//! Signal strategies
//!
//! Each strategy is a pure function of a [`MarketSnapshot`] and the
//! [`Indicators`] computed for the same cycle. Strategies never fail: when a
//! setup is absent they return a "no signal" with the reason.

pub mod funding_arb;
pub mod liquidation_hunt;
pub mod mean_reversion;
pub mod momentum;
pub mod plan;


pub use funding_arb::FundingArbitrageStrategy;
pub use liquidation_hunt::LiquidationHuntStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;
pub use plan::{LeverageChoice, TradePlanner};

use crate::config::{RiskConfig, StrategyConfig};
use crate::types::{AnalysisResult, Indicators, MarketSnapshot, Signal, StrategyKind};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Ceiling on the confidence this strategy ever reports
    fn max_confidence(&self) -> Decimal;

    fn evaluate(&self, snapshot: &MarketSnapshot, indicators: &Indicators) -> Signal;
}

/// The configured strategies, evaluated together every cycle.
pub struct StrategySet {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategySet {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// All four strategies sharing one trade planner.
    pub fn from_config(config: &StrategyConfig, risk: &RiskConfig) -> Self {
        let planner = TradePlanner::new(risk.clone(), config.funding_period_hours());
        Self::new(vec![
            Box::new(MomentumStrategy::new(config.clone(), planner.clone())),
            Box::new(MeanReversionStrategy::new(config.clone(), planner.clone())),
            Box::new(FundingArbitrageStrategy::new(config.clone(), planner.clone())),
            Box::new(LiquidationHuntStrategy::new(config.clone(), planner)),
        ])
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn evaluate_all(&self, snapshot: &MarketSnapshot, indicators: &Indicators) -> Vec<Signal> {
        self.strategies
            .iter()
            .map(|strategy| {
                let signal = strategy.evaluate(snapshot, indicators);
                tracing::debug!(
                    "{}: {} ({:.2})",
                    strategy.kind(),
                    signal.direction(),
                    signal.confidence()
                );
                signal
            })
            .collect()
    }
}

/// Bundles one cycle's outputs, ordering signals by strategy.
pub fn aggregate(snapshot: MarketSnapshot, indicators: Indicators, mut signals: Vec<Signal>) -> AnalysisResult {
    signals.sort_by_key(|s| s.strategy());
    AnalysisResult {
        cycle_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        snapshot,
        indicators,
        signals,
    }
}

/// `num / den`, or zero when `den` is zero
pub(crate) fn ratio(num: Decimal, den: Decimal) -> Decimal {
    if den.is_zero() {
        Decimal::ZERO
    } else {
        num / den
    }
}

/// Formats a fraction as a percentage with `dp` decimals
pub(crate) fn pct(value: Decimal, dp: u32) -> String {
    format!("{}%", (value * Decimal::ONE_HUNDRED).round_dp(dp))
}
