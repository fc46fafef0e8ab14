//! Funding arbitrage: take the side that collects funding when it is extreme

use super::{pct, ratio, LeverageChoice, Strategy, TradePlanner};
use crate::config::StrategyConfig;
use crate::types::{Direction, Indicators, MarketSnapshot, Side, Signal, StrategyKind, TradeLevels};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const MAX_CONFIDENCE: Decimal = dec!(0.9);

pub struct FundingArbitrageStrategy {
    config: StrategyConfig,
    planner: TradePlanner,
}

impl FundingArbitrageStrategy {
    pub fn new(config: StrategyConfig, planner: TradePlanner) -> Self {
        Self { config, planner }
    }
}

impl Strategy for FundingArbitrageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FundingArbitrage
    }

    fn max_confidence(&self) -> Decimal {
        MAX_CONFIDENCE
    }

    fn evaluate(&self, snapshot: &MarketSnapshot, ind: &Indicators) -> Signal {
        let kind = self.kind();
        let (Some(rate), Some(annualized)) = (
            snapshot.funding_rate,
            snapshot.annualized_funding(self.config.funding_periods_per_day),
        ) else {
            return Signal::none(kind, "Funding rate unavailable from every provider");
        };

        if annualized.abs() < self.config.min_annualized_funding {
            return Signal::none(
                kind,
                format!(
                    "Funding {} per period ({} annualized) below the {} threshold",
                    pct(rate, 4),
                    pct(annualized, 1),
                    pct(self.config.min_annualized_funding, 0)
                ),
            );
        }

        // Positive funding: longs pay shorts
        let (side, flow) = if rate > Decimal::ZERO {
            (Side::Short, "Longs pay shorts")
        } else {
            (Side::Long, "Shorts pay longs")
        };
        let confidence = (MAX_CONFIDENCE * ratio(annualized.abs(), self.config.funding_saturation).min(Decimal::ONE))
            .min(MAX_CONFIDENCE);

        let risk = self.planner.risk();
        let Some(levels) = TradeLevels::from_pcts(side, snapshot.price, risk.stop_loss_pct, &risk.take_profit_pcts) else {
            return Signal::none(kind, "Could not place stop and targets");
        };

        let hold = self.config.funding_hold_hours;
        let periods = Decimal::from(hold) / Decimal::from(self.config.funding_period_hours().max(1));
        let income = rate.abs() * periods;
        let rationale = vec![
            format!(
                "Funding {} per {}h ({} annualized)",
                pct(rate, 4),
                self.config.funding_period_hours(),
                pct(annualized, 1)
            ),
            format!("{}; a {} position collects", flow, Direction::from(side)),
            format!(
                "Est. funding income over {}h: {} (~${:.2} per ${:.0} notional)",
                hold,
                pct(income, 3),
                income * risk.account_capital,
                risk.account_capital
            ),
        ];

        let plan = self.planner.plan(
            levels,
            confidence,
            LeverageChoice::Fixed(risk.funding_leverage),
            hold,
            snapshot,
            ind,
        );
        Signal::directional(kind, confidence, plan, rationale)
    }
}

