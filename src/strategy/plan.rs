//! Leverage, liquidation and sizing for a set of trade levels

use crate::config::RiskConfig;
use crate::types::{Indicators, MarketSnapshot, Side, TradeLevels, TradePlan};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Base leverage at full confidence before the volatility haircut
const BASE_LEVERAGE: Decimal = dec!(8);
/// Keep the liquidation price this far (relative) beyond the stop
const LIQUIDATION_BUFFER: Decimal = dec!(0.95);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeverageChoice {
    /// Scaled by confidence and realized volatility
    Dynamic,
    /// Strategy-specific fixed leverage, still capped by risk limits
    Fixed(Decimal),
}

#[derive(Debug, Clone)]
pub struct TradePlanner {
    risk: RiskConfig,
    funding_period_hours: u32,
}

impl TradePlanner {
    pub fn new(risk: RiskConfig, funding_period_hours: u32) -> Self {
        Self {
            risk,
            funding_period_hours: funding_period_hours.max(1),
        }
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn plan(
        &self,
        levels: TradeLevels,
        confidence: Decimal,
        leverage: LeverageChoice,
        hold_hours: u32,
        snapshot: &MarketSnapshot,
        indicators: &Indicators,
    ) -> TradePlan {
        let wanted = match leverage {
            LeverageChoice::Dynamic => self.dynamic_leverage(confidence, indicators.volatility),
            LeverageChoice::Fixed(lev) => lev,
        };
        let leverage = self.cap_leverage(wanted, levels.stop_distance());

        let entry = levels.entry_price();
        let mm = self.risk.maintenance_margin;
        let liquidation_price = match levels.side() {
            Side::Long => entry * (Decimal::ONE - Decimal::ONE / leverage + mm),
            Side::Short => entry * (Decimal::ONE + Decimal::ONE / leverage - mm),
        };

        let max_risk_usd = self.risk.account_capital * self.risk.max_position_risk;
        let risk_per_btc = (entry - levels.stop_loss()).abs();
        let position_size_btc = if risk_per_btc.is_zero() {
            Decimal::ZERO
        } else {
            (max_risk_usd / risk_per_btc).round_dp(4)
        };
        let margin_usd = (position_size_btc * entry / leverage).round_dp(2);

        let periods = Decimal::from(hold_hours) / Decimal::from(self.funding_period_hours);
        let funding_carry_pct = snapshot
            .funding_rate
            .map(|rate| -levels.side().sign() * rate * periods);

        TradePlan {
            risk_reward: levels.risk_reward().round_dp(2),
            levels,
            leverage,
            liquidation_price,
            position_size_btc,
            margin_usd,
            max_risk_usd,
            hold_hours,
            funding_carry_pct,
        }
    }

    /// `confidence * 8`, reduced when daily volatility is high
    fn dynamic_leverage(&self, confidence: Decimal, volatility: Decimal) -> Decimal {
        let daily_vol = volatility
            * Decimal::from(self.risk.periods_per_day)
                .sqrt()
                .unwrap_or(Decimal::ONE);
        let haircut = (Decimal::ONE - dec!(3) * daily_vol).max(dec!(0.3));
        confidence * BASE_LEVERAGE * haircut
    }

    /// Clamps to `[1, max_leverage]` and keeps the liquidation price beyond the stop.
    fn cap_leverage(&self, wanted: Decimal, stop_distance: Decimal) -> Decimal {
        let mut cap = self.risk.max_leverage;
        let to_liquidation = stop_distance + self.risk.maintenance_margin;
        if to_liquidation > Decimal::ZERO {
            cap = cap.min(LIQUIDATION_BUFFER / to_liquidation);
        }
        wanted
            .min(cap)
            .round_dp_with_strategy(1, RoundingStrategy::ToZero)
            .max(Decimal::ONE)
    }
}
