//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn plan(levels: TradeLevels, funding_carry_pct: Option<Decimal>) -> TradePlan {
        TradePlan {
            risk_reward: levels.risk_reward(),
            levels,
            leverage: dec!(5),
            liquidation_price: dec!(1),
            position_size_btc: dec!(0.1),
            margin_usd: dec!(1000),
            max_risk_usd: dec!(200),
            hold_hours: 24,
            funding_carry_pct,
        }
    }

    fn long_levels() -> TradeLevels {
        TradeLevels::from_pcts(Side::Long, dec!(60000), dec!(0.04), &[dec!(0.03), dec!(0.06)]).unwrap()
    }

    #[test]
    fn test_side_serialization() {
        assert_eq!(serde_json::to_string(&Side::Long).unwrap(), "\"LONG\"");
        assert_eq!(serde_json::to_string(&Direction::None).unwrap(), "\"NONE\"");
        let short: Side = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(short, Side::Short);
    }

    #[test]
    fn test_provider_kind_serde() {
        assert_eq!(serde_json::to_string(&ProviderKind::CryptoCompare).unwrap(), "\"cryptocompare\"");
        let kind: ProviderKind = serde_json::from_str("\"coingecko\"").unwrap();
        assert_eq!(kind, ProviderKind::CoinGecko);
        assert_eq!(ProviderKind::CoinGecko.to_string(), "CoinGecko");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Long.to_string(), "LONG");
        assert_eq!(Direction::None.to_string(), "NO SIGNAL");
        assert_eq!(Direction::from(Side::Short), Direction::Short);
    }

    #[test]
    fn test_strategy_order() {
        let mut kinds = vec![
            StrategyKind::LiquidationHunt,
            StrategyKind::Momentum,
            StrategyKind::FundingArbitrage,
            StrategyKind::MeanReversion,
        ];
        kinds.sort();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[test]
    fn test_annualized_funding() {
        let mut snap = MarketSnapshot::new(ProviderKind::Binance, dec!(60000), dec!(1));
        assert_eq!(snap.annualized_funding(3), None);
        snap.funding_rate = Some(dec!(0.0001));
        assert_eq!(snap.annualized_funding(3), Some(dec!(0.1095)));
    }

    #[test]
    fn test_price_series_sorted_and_truncated() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let point = |h: i64, close: Decimal| PricePoint {
            timestamp: t0 + Duration::hours(h),
            close,
            volume: dec!(1),
        };
        let series = PriceSeries::new(vec![point(2, dec!(3)), point(0, dec!(1)), point(1, dec!(2))]);

        assert_eq!(series.closes(), vec![dec!(1), dec!(2), dec!(3)]);
        assert_eq!(series.latest().unwrap().close, dec!(3));

        let series = series.truncate_to_latest(2);
        assert_eq!(series.closes(), vec![dec!(2), dec!(3)]);
        assert_eq!(series.truncate_to_latest(10).len(), 2);
    }

    #[test]
    fn test_trade_levels_long_ordering() {
        let levels = long_levels();
        assert_eq!(levels.stop_loss(), dec!(57600));
        assert_eq!(levels.take_profit(), dec!(61800));
        assert_eq!(levels.extra_targets(), &[dec!(63600)]);
        assert_eq!(levels.stop_distance(), dec!(0.04));
        assert_eq!(levels.risk_reward(), dec!(0.75));
    }

    #[test]
    fn test_trade_levels_short_ordering() {
        let levels = TradeLevels::from_pcts(Side::Short, dec!(60000), dec!(0.02), &[dec!(0.03)]).unwrap();
        assert!(levels.take_profit() < levels.entry_price());
        assert!(levels.entry_price() < levels.stop_loss());
        assert_eq!(levels.risk_reward(), dec!(1.5));
    }

    #[test]
    fn test_trade_levels_reject_misordered() {
        // Long with the target below entry
        assert!(TradeLevels::new(Side::Long, dec!(100), dec!(95), dec!(99), vec![]).is_none());
        // Short with the stop below entry
        assert!(TradeLevels::new(Side::Short, dec!(100), dec!(95), dec!(90), vec![]).is_none());
        assert!(TradeLevels::new(Side::Long, Decimal::ZERO, dec!(95), dec!(99), vec![]).is_none());
        assert!(TradeLevels::from_pcts(Side::Long, dec!(100), dec!(0.02), &[]).is_none());
    }

    #[test]
    fn test_trade_levels_drop_targets_not_beyond() {
        let levels = TradeLevels::new(Side::Long, dec!(100), dec!(95), dec!(105), vec![dec!(104), dec!(110), dec!(108)]).unwrap();
        assert_eq!(levels.extra_targets(), &[dec!(110)]);
    }

    #[test]
    fn test_none_signal_has_no_levels() {
        let signal = Signal::none(StrategyKind::Momentum, "inside bands");
        assert!(!signal.is_directional());
        assert_eq!(signal.confidence(), Decimal::ZERO);
        assert!(signal.plan().is_none());
        assert!(signal.entry_price().is_none());
        assert!(signal.stop_loss().is_none());
        assert!(signal.take_profit().is_none());
        assert_eq!(signal.rationale(), &["inside bands".to_string()]);
    }

    #[test]
    fn test_directional_signal() {
        let signal = Signal::directional(StrategyKind::Momentum, dec!(1.4), plan(long_levels(), None), vec![]);
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.confidence(), Decimal::ONE);
        assert_eq!(signal.confidence_tier(), ConfidenceTier::High);
        assert_eq!(signal.entry_price(), Some(dec!(60000)));
    }

    #[test]
    fn test_confidence_tiers() {
        let tier = |c: Decimal| Signal::directional(StrategyKind::Momentum, c, plan(long_levels(), None), vec![]).confidence_tier();
        assert_eq!(tier(dec!(0.2)), ConfidenceTier::Low);
        assert_eq!(tier(dec!(0.4)), ConfidenceTier::Medium);
        assert_eq!(tier(dec!(0.7)), ConfidenceTier::High);
    }

    fn result(signals: Vec<Signal>) -> AnalysisResult {
        AnalysisResult {
            cycle_id: uuid::Uuid::new_v4(),
            generated_at: Utc::now(),
            snapshot: MarketSnapshot::new(ProviderKind::Kraken, dec!(60000), dec!(1)),
            indicators: Indicators {
                bollinger_upper: dec!(61000),
                bollinger_mid: dec!(60000),
                bollinger_lower: dec!(59000),
                rsi: dec!(50),
                zscore: Decimal::ZERO,
                volatility: dec!(0.003),
                annualized_volatility: dec!(0.28),
                volume_ratio: None,
                window: 20,
                observations: 200,
            },
            signals,
        }
    }

    #[test]
    fn test_recommended_prefers_confidence() {
        let result = result(vec![
            Signal::directional(StrategyKind::Momentum, dec!(0.5), plan(long_levels(), None), vec![]),
            Signal::directional(StrategyKind::MeanReversion, dec!(0.8), plan(long_levels(), None), vec![]),
            Signal::none(StrategyKind::FundingArbitrage, "quiet"),
        ]);
        assert_eq!(result.recommended().unwrap().strategy(), StrategyKind::MeanReversion);
        assert_eq!(result.directional_signals().count(), 2);
    }

    #[test]
    fn test_recommended_funding_carry_bonus() {
        let result = result(vec![
            Signal::directional(StrategyKind::Momentum, dec!(0.8), plan(long_levels(), None), vec![]),
            Signal::directional(StrategyKind::FundingArbitrage, dec!(0.6), plan(long_levels(), Some(dec!(0.0027))), vec![]),
        ]);
        // 0.4 + 0.075 vs 0.3 + 0.075 + 0.2
        assert_eq!(result.recommended().unwrap().strategy(), StrategyKind::FundingArbitrage);
    }

    #[test]
    fn test_no_recommendation_without_setups() {
        let result = result(vec![Signal::none(StrategyKind::Momentum, "quiet")]);
        assert!(result.recommended().is_none());
        assert!(result.signal(StrategyKind::Momentum).is_some());
        assert!(result.signal(StrategyKind::LiquidationHunt).is_none());
    }
}
