//! Momentum breakout: close outside a Bollinger band, confirmed by RSI and volume

use super::{pct, ratio, LeverageChoice, Strategy, TradePlanner};
use crate::config::StrategyConfig;
use crate::types::{Indicators, MarketSnapshot, Side, Signal, StrategyKind, TradeLevels};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const HOLD_HOURS: u32 = 12;
const MAX_CONFIDENCE: Decimal = dec!(0.95);

pub struct MomentumStrategy {
    config: StrategyConfig,
    planner: TradePlanner,
}

impl MomentumStrategy {
    pub fn new(config: StrategyConfig, planner: TradePlanner) -> Self {
        Self { config, planner }
    }
}

impl Strategy for MomentumStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn max_confidence(&self) -> Decimal {
        MAX_CONFIDENCE
    }

    fn evaluate(&self, snapshot: &MarketSnapshot, ind: &Indicators) -> Signal {
        let kind = self.kind();
        let price = snapshot.price;

        let side = if price > ind.bollinger_upper && ind.rsi > self.config.rsi_bullish {
            Side::Long
        } else if price < ind.bollinger_lower && ind.rsi < self.config.rsi_bearish {
            Side::Short
        } else {
            return Signal::none(
                kind,
                format!(
                    "No confirmed breakout: price ${:.2} vs bands ${:.2}-${:.2}, RSI {:.1}",
                    price, ind.bollinger_lower, ind.bollinger_upper, ind.rsi
                ),
            );
        };

        let Some(volume_ratio) = ind.volume_ratio else {
            return Signal::none(kind, "Breakout unconfirmed: history has no per-bar volume");
        };
        if volume_ratio < self.config.volume_spike_multiple {
            return Signal::none(
                kind,
                format!(
                    "Breakout lacks volume: {:.2}x vs {:.2}x required",
                    volume_ratio, self.config.volume_spike_multiple
                ),
            );
        }

        let half_width = ind.bollinger_upper - ind.bollinger_mid;
        let (excess, rsi_extremity) = match side {
            Side::Long => (
                ratio(price - ind.bollinger_upper, half_width),
                ratio(ind.rsi - self.config.rsi_bullish, Decimal::ONE_HUNDRED - self.config.rsi_bullish),
            ),
            Side::Short => (
                ratio(ind.bollinger_lower - price, half_width),
                ratio(self.config.rsi_bearish - ind.rsi, self.config.rsi_bearish),
            ),
        };
        let confidence = (dec!(0.5)
            + dec!(0.25) * excess.min(Decimal::ONE)
            + dec!(0.2) * rsi_extremity.min(Decimal::ONE))
        .min(MAX_CONFIDENCE);

        let risk = self.planner.risk();
        let Some(levels) = TradeLevels::from_pcts(side, price, risk.stop_loss_pct, &risk.take_profit_pcts) else {
            return Signal::none(kind, "Could not place stop and targets");
        };

        let (band, band_price, rsi_word) = match side {
            Side::Long => ("upper", ind.bollinger_upper, "bullish"),
            Side::Short => ("lower", ind.bollinger_lower, "bearish"),
        };
        let rationale = vec![
            format!("Price ${:.2} broke the {} band at ${:.2}", price, band, band_price),
            format!("RSI {:.1} confirms {} momentum", ind.rsi, rsi_word),
            format!("Volume {:.2}x the {}-period average", volume_ratio, ind.window),
            format!("Stop {} away", pct(risk.stop_loss_pct, 1)),
        ];

        let plan = self
            .planner
            .plan(levels, confidence, LeverageChoice::Dynamic, HOLD_HOURS, snapshot, ind);
        Signal::directional(kind, confidence, plan, rationale)
    }
}
