//! Core types shared by the fetcher, the indicator calculator and the strategies

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Public market data providers, in no particular order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Binance,
    Coinbase,
    Kraken,
    CryptoCompare,
    CoinGecko,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Binance,
        ProviderKind::Coinbase,
        ProviderKind::Kraken,
        ProviderKind::CryptoCompare,
        ProviderKind::CoinGecko,
    ];
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Binance => "Binance",
            ProviderKind::Coinbase => "Coinbase",
            ProviderKind::Kraken => "Kraken",
            ProviderKind::CryptoCompare => "CryptoCompare",
            ProviderKind::CoinGecko => "CoinGecko",
        };
        f.write_str(name)
    }
}

/// Point-in-time market data for BTC, normalized across providers.
///
/// Fields a provider does not publish are `None`; nothing is estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: Decimal,
    /// 24h traded volume as reported by the provider
    pub volume_24h: Decimal,
    /// Funding rate per funding period (8h on the major venues)
    pub funding_rate: Option<Decimal>,
    pub open_interest: Option<Decimal>,
    pub next_funding_time: Option<DateTime<Utc>>,
    pub price_change_24h_pct: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub source: ProviderKind,
    /// Provider the funding fields came from, when different from `source`
    pub funding_source: Option<ProviderKind>,
}

impl MarketSnapshot {
    pub fn new(source: ProviderKind, price: Decimal, volume_24h: Decimal) -> Self {
        Self {
            price,
            volume_24h,
            funding_rate: None,
            open_interest: None,
            next_funding_time: None,
            price_change_24h_pct: None,
            timestamp: Utc::now(),
            source,
            funding_source: None,
        }
    }

    /// Funding rate scaled to a yearly figure (0.15 = 15% a year).
    pub fn annualized_funding(&self, periods_per_day: u32) -> Option<Decimal> {
        self.funding_rate
            .map(|rate| rate * Decimal::from(periods_per_day) * dec!(365))
    }
}

/// One historical observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Historical observations ordered oldest to newest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series, sorting by timestamp so callers can pass provider
    /// output in whatever order it arrived.
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn volumes(&self) -> Vec<Decimal> {
        self.points.iter().map(|p| p.volume).collect()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Keeps only the newest `n` points.
    pub fn truncate_to_latest(mut self, n: usize) -> Self {
        if self.points.len() > n {
            self.points.drain(..self.points.len() - n);
        }
        self
    }
}

/// Indicators derived from a [`PriceSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicators {
    pub bollinger_upper: Decimal,
    pub bollinger_mid: Decimal,
    pub bollinger_lower: Decimal,
    /// 0-100
    pub rsi: Decimal,
    pub zscore: Decimal,
    /// Standard deviation of per-period returns
    pub volatility: Decimal,
    pub annualized_volatility: Decimal,
    /// Latest volume over the window's mean volume
    pub volume_ratio: Option<Decimal>,
    pub window: usize,
    pub observations: usize,
}

impl Indicators {
    pub fn band_width(&self) -> Decimal {
        self.bollinger_upper - self.bollinger_lower
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyKind {
    Momentum,
    MeanReversion,
    FundingArbitrage,
    LiquidationHunt,
}

impl StrategyKind {
    /// Presentation order
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::FundingArbitrage,
        StrategyKind::LiquidationHunt,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Momentum => "Momentum Breakout",
            StrategyKind::MeanReversion => "Mean Reversion",
            StrategyKind::FundingArbitrage => "Funding Arbitrage",
            StrategyKind::LiquidationHunt => "Liquidation Hunt",
        };
        f.write_str(name)
    }
}

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Direction a strategy recommends; `None` means no trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    None,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Direction::Long,
            Side::Short => Direction::Short,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::None => "NO SIGNAL",
        };
        f.write_str(name)
    }
}

/// Entry, stop and targets of a position, position-consistent by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeLevels {
    side: Side,
    entry_price: Decimal,
    stop_loss: Decimal,
    take_profit: Decimal,
    extra_targets: Vec<Decimal>,
}

impl TradeLevels {
    /// Returns `None` unless `stop < entry < take_profit` for longs (reverse for
    /// shorts). Extra targets not beyond `take_profit` are dropped.
    pub fn new(
        side: Side,
        entry_price: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        extra_targets: Vec<Decimal>,
    ) -> Option<Self> {
        if entry_price <= Decimal::ZERO || stop_loss <= Decimal::ZERO || take_profit <= Decimal::ZERO {
            return None;
        }

        let ordered = match side {
            Side::Long => stop_loss < entry_price && entry_price < take_profit,
            Side::Short => take_profit < entry_price && entry_price < stop_loss,
        };
        if !ordered {
            return None;
        }

        let mut last = take_profit;
        let mut kept = Vec::with_capacity(extra_targets.len());
        for target in extra_targets {
            let beyond = match side {
                Side::Long => target > last,
                Side::Short => target < last && target > Decimal::ZERO,
            };
            if beyond {
                kept.push(target);
                last = target;
            }
        }

        Some(Self {
            side,
            entry_price,
            stop_loss,
            take_profit,
            extra_targets: kept,
        })
    }

    /// Stop and targets at fixed percentage distances from `entry_price`.
    pub fn from_pcts(side: Side, entry_price: Decimal, stop_pct: Decimal, target_pcts: &[Decimal]) -> Option<Self> {
        let (first, rest) = target_pcts.split_first()?;
        let sign = side.sign();
        let stop = entry_price * (Decimal::ONE - sign * stop_pct);
        let target = |pct: &Decimal| entry_price * (Decimal::ONE + sign * *pct);
        Self::new(side, entry_price, stop, target(first), rest.iter().map(target).collect())
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    pub fn take_profit(&self) -> Decimal {
        self.take_profit
    }

    pub fn extra_targets(&self) -> &[Decimal] {
        &self.extra_targets
    }

    /// Distance from entry to stop as a fraction of entry
    pub fn stop_distance(&self) -> Decimal {
        (self.entry_price - self.stop_loss).abs() / self.entry_price
    }

    pub fn risk_reward(&self) -> Decimal {
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk.is_zero() {
            return Decimal::ZERO;
        }
        (self.take_profit - self.entry_price).abs() / risk
    }
}

/// Sizing and risk figures for a directional signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePlan {
    pub levels: TradeLevels,
    pub leverage: Decimal,
    pub liquidation_price: Decimal,
    pub risk_reward: Decimal,
    pub position_size_btc: Decimal,
    pub margin_usd: Decimal,
    pub max_risk_usd: Decimal,
    pub hold_hours: u32,
    /// Funding received (+) or paid (-) over the hold horizon, as a fraction
    /// of notional
    pub funding_carry_pct: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        };
        f.write_str(name)
    }
}

/// Output of one strategy for one analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    strategy: StrategyKind,
    direction: Direction,
    confidence: Decimal,
    plan: Option<TradePlan>,
    rationale: Vec<String>,
}

impl Signal {
    /// A "no trade" signal. Carries no levels.
    pub fn none(strategy: StrategyKind, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            direction: Direction::None,
            confidence: Decimal::ZERO,
            plan: None,
            rationale: vec![reason.into()],
        }
    }

    /// A directional signal; the direction comes from the plan's side.
    /// `confidence` is clamped to `[0, 1]`.
    pub fn directional(
        strategy: StrategyKind,
        confidence: Decimal,
        plan: TradePlan,
        rationale: Vec<String>,
    ) -> Self {
        Self {
            strategy,
            direction: plan.levels.side().into(),
            confidence: confidence.max(Decimal::ZERO).min(Decimal::ONE),
            plan: Some(plan),
            rationale,
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_directional(&self) -> bool {
        self.direction != Direction::None
    }

    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    pub fn confidence_tier(&self) -> ConfidenceTier {
        if self.confidence >= dec!(0.7) {
            ConfidenceTier::High
        } else if self.confidence >= dec!(0.4) {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn plan(&self) -> Option<&TradePlan> {
        self.plan.as_ref()
    }

    pub fn entry_price(&self) -> Option<Decimal> {
        self.plan.as_ref().map(|p| p.levels.entry_price())
    }

    pub fn stop_loss(&self) -> Option<Decimal> {
        self.plan.as_ref().map(|p| p.levels.stop_loss())
    }

    pub fn take_profit(&self) -> Option<Decimal> {
        self.plan.as_ref().map(|p| p.levels.take_profit())
    }

    pub fn rationale(&self) -> &[String] {
        &self.rationale
    }
}

/// Everything one analysis cycle produced, handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub snapshot: MarketSnapshot,
    pub indicators: Indicators,
    /// One per strategy, in [`StrategyKind::ALL`] order
    pub signals: Vec<Signal>,
}

impl AnalysisResult {
    pub fn signal(&self, kind: StrategyKind) -> Option<&Signal> {
        self.signals.iter().find(|s| s.strategy() == kind)
    }

    pub fn directional_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.is_directional())
    }

    /// Best directional signal by confidence and risk/reward, if any.
    pub fn recommended(&self) -> Option<&Signal> {
        let mut best: Option<(&Signal, Decimal)> = None;
        for signal in self.directional_signals() {
            let score = recommendation_score(signal);
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((signal, score)),
            }
        }
        best.map(|(s, _)| s)
    }
}

fn recommendation_score(signal: &Signal) -> Decimal {
    let rr = signal.plan().map(|p| p.risk_reward).unwrap_or(Decimal::ZERO);
    let mut score = signal.confidence() * dec!(0.5) + (rr / dec!(3)).min(Decimal::ONE) * dec!(0.3);

    match signal.strategy() {
        StrategyKind::FundingArbitrage => {
            let carry = signal
                .plan()
                .and_then(|p| p.funding_carry_pct)
                .unwrap_or(Decimal::ZERO);
            if carry >= dec!(0.001) {
                score += dec!(0.2);
            }
        }
        StrategyKind::LiquidationHunt if signal.confidence() > dec!(0.7) => {
            score += dec!(0.15);
        }
        _ => {}
    }
    score
}
