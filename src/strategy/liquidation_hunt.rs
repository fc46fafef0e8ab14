//! Liquidation hunt: trade toward an estimated cluster of forced liquidations
//!
//! There is no public liquidation map, so clusters are estimated: positions
//! are assumed to have been opened around the band midline at common leverage
//! tiers, and each tier's liquidation price is computed from the maintenance
//! margin. Signals from this strategy are labelled as heuristic.

use super::{pct, ratio, LeverageChoice, Strategy, TradePlanner};
use crate::config::StrategyConfig;
use crate::types::{Indicators, MarketSnapshot, Side, Signal, StrategyKind, TradeLevels};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const HOLD_HOURS: u32 = 2;
const MAX_CONFIDENCE: Decimal = dec!(0.85);

/// Estimated liquidation level for one leverage tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    pub leverage: u32,
    /// Side of the positions that get liquidated here
    pub liquidated: Side,
    pub price: Decimal,
}

impl Cluster {
    /// Fractional distance from `price` in the direction the cluster lies;
    /// positive when the cluster is ahead of price (below for longs, above
    /// for shorts).
    fn distance_from(&self, price: Decimal) -> Decimal {
        match self.liquidated {
            Side::Long => ratio(price - self.price, price),
            Side::Short => ratio(self.price - price, price),
        }
    }
}

/// Long and short liquidation levels for each tier, assuming entry at `anchor`.
pub fn estimate_clusters(anchor: Decimal, tiers: &[u32], maintenance_margin: Decimal) -> Vec<Cluster> {
    let mut clusters = Vec::with_capacity(tiers.len() * 2);
    for &tier in tiers.iter().filter(|&&t| t > 0) {
        let inv = Decimal::ONE / Decimal::from(tier);
        clusters.push(Cluster {
            leverage: tier,
            liquidated: Side::Long,
            price: anchor * (Decimal::ONE - inv + maintenance_margin),
        });
        clusters.push(Cluster {
            leverage: tier,
            liquidated: Side::Short,
            price: anchor * (Decimal::ONE + inv - maintenance_margin),
        });
    }
    clusters
}

pub struct LiquidationHuntStrategy {
    config: StrategyConfig,
    planner: TradePlanner,
}

impl LiquidationHuntStrategy {
    pub fn new(config: StrategyConfig, planner: TradePlanner) -> Self {
        Self { config, planner }
    }

    fn proximity(&self, ind: &Indicators) -> Decimal {
        (self.config.proximity_vol_multiple * ind.volatility).min(self.config.max_proximity)
    }
}

impl Strategy for LiquidationHuntStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LiquidationHunt
    }

    fn max_confidence(&self) -> Decimal {
        MAX_CONFIDENCE
    }

    fn evaluate(&self, snapshot: &MarketSnapshot, ind: &Indicators) -> Signal {
        let kind = self.kind();
        let price = snapshot.price;
        let anchor = ind.bollinger_mid;
        let band = self.proximity(ind);

        if anchor <= Decimal::ZERO || band <= Decimal::ZERO {
            return Signal::none(kind, "No volatility to size a proximity band");
        }

        let clusters = estimate_clusters(anchor, &self.config.liquidation_leverage_tiers, self.planner.risk().maintenance_margin);
        let nearest = clusters
            .iter()
            .map(|c| (c, c.distance_from(price)))
            .filter(|(_, d)| *d > Decimal::ZERO && *d <= band)
            .fold(None::<(&Cluster, Decimal)>, |best, (c, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((c, d)),
            });

        let Some((cluster, distance)) = nearest else {
            return Signal::none(
                kind,
                format!("No estimated liquidation cluster within {} of price", pct(band, 2)),
            );
        };

        let Some(volume_ratio) = ind.volume_ratio else {
            return Signal::none(kind, "Cascade unconfirmed: history has no per-bar volume");
        };
        if volume_ratio < self.config.liquidation_volume_spike {
            return Signal::none(
                kind,
                format!(
                    "Cluster at ${:.2} is near but volume is only {:.2}x",
                    cluster.price, volume_ratio
                ),
            );
        }

        // Trade with the cascade: liquidated longs sell, liquidated shorts buy
        let side = match cluster.liquidated {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        };
        let stop_pct = self.planner.risk().liquidation_stop_pct;
        let (stop, overshoot) = match side {
            Side::Short => (
                price * (Decimal::ONE + stop_pct),
                cluster.price * (Decimal::ONE - band / dec!(2)),
            ),
            Side::Long => (
                price * (Decimal::ONE - stop_pct),
                cluster.price * (Decimal::ONE + band / dec!(2)),
            ),
        };
        let Some(levels) = TradeLevels::new(side, price, stop, cluster.price, vec![overshoot]) else {
            return Signal::none(kind, "Could not place stop and targets");
        };

        let closeness = Decimal::ONE - ratio(distance, band);
        let surge = ratio(
            volume_ratio - self.config.liquidation_volume_spike,
            self.config.liquidation_volume_spike,
        );
        let confidence = (dec!(0.4) + dec!(0.3) * closeness + dec!(0.15) * surge.min(Decimal::ONE))
            .min(MAX_CONFIDENCE);

        let who = match cluster.liquidated {
            Side::Long => "long",
            Side::Short => "short",
        };
        let rationale = vec![
            format!(
                "Heuristic: {}x {} liquidations estimated near ${:.2} ({} away)",
                cluster.leverage,
                who,
                cluster.price,
                pct(distance, 2)
            ),
            format!("Assumes entries around the {}-period mean ${:.2}", ind.window, anchor),
            format!("Volume {:.2}x baseline suggests forced flow", volume_ratio),
        ];

        let plan = self.planner.plan(
            levels,
            confidence,
            LeverageChoice::Fixed(self.planner.risk().liquidation_leverage),
            HOLD_HOURS,
            snapshot,
            ind,
        );
        Signal::directional(kind, confidence, plan, rationale)
    }
}
