//! Mean reversion: fade statistically stretched moves back to the band midline

use super::{pct, ratio, LeverageChoice, Strategy, TradePlanner};
use crate::config::StrategyConfig;
use crate::types::{Indicators, MarketSnapshot, Side, Signal, StrategyKind, TradeLevels};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const HOLD_HOURS: u32 = 6;
const MAX_CONFIDENCE: Decimal = dec!(0.9);

pub struct MeanReversionStrategy {
    config: StrategyConfig,
    planner: TradePlanner,
}

impl MeanReversionStrategy {
    pub fn new(config: StrategyConfig, planner: TradePlanner) -> Self {
        Self { config, planner }
    }
}

impl Strategy for MeanReversionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn max_confidence(&self) -> Decimal {
        MAX_CONFIDENCE
    }

    fn evaluate(&self, snapshot: &MarketSnapshot, ind: &Indicators) -> Signal {
        let kind = self.kind();
        let threshold = self.config.zscore_threshold;
        let z = ind.zscore;

        let side = if z > threshold && ind.rsi > self.config.rsi_overbought {
            Side::Short
        } else if z < -threshold && ind.rsi < self.config.rsi_oversold {
            Side::Long
        } else {
            return Signal::none(
                kind,
                format!("Not stretched: z-score {:.2}, RSI {:.1}", z, ind.rsi),
            );
        };

        let price = snapshot.price;
        let stop_pct = self.planner.risk().mean_reversion_stop_pct;
        let (stop, far_target) = match side {
            Side::Long => (price * (Decimal::ONE - stop_pct), ind.bollinger_upper),
            Side::Short => (price * (Decimal::ONE + stop_pct), ind.bollinger_lower),
        };
        // The live price may already have crossed back over the mean
        let Some(levels) = TradeLevels::new(side, price, stop, ind.bollinger_mid, vec![far_target]) else {
            return Signal::none(
                kind,
                format!(
                    "Price ${:.2} already back past the mean ${:.2}",
                    price, ind.bollinger_mid
                ),
            );
        };

        let rsi_extremity = match side {
            Side::Short => ratio(
                ind.rsi - self.config.rsi_overbought,
                Decimal::ONE_HUNDRED - self.config.rsi_overbought,
            ),
            Side::Long => ratio(self.config.rsi_oversold - ind.rsi, self.config.rsi_oversold),
        };
        let stretch = ratio(z.abs() - threshold, threshold);
        let confidence = (dec!(0.5)
            + dec!(0.2) * stretch.min(Decimal::ONE)
            + dec!(0.2) * rsi_extremity.min(Decimal::ONE))
        .min(MAX_CONFIDENCE);

        let state = match side {
            Side::Short => "overbought",
            Side::Long => "oversold",
        };
        let rationale = vec![
            format!("Z-score {:.2} beyond +/-{:.1}", z, threshold),
            format!("RSI {:.1} {}", ind.rsi, state),
            format!("Target the {}-period mean at ${:.2}", ind.window, ind.bollinger_mid),
            format!("Tight stop {} away", pct(stop_pct, 1)),
        ];

        let plan = self
            .planner
            .plan(levels, confidence, LeverageChoice::Dynamic, HOLD_HOURS, snapshot, ind);
        Signal::directional(kind, confidence, plan, rationale)
    }
}
