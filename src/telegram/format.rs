//! HTML message bodies for Telegram

use crate::error::BotError;
use crate::types::{AnalysisResult, Direction, MarketSnapshot, Signal, StrategyKind};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const WELCOME: &str = "🤖 <b>Bitcoin Perpetual Futures Signal Bot</b>

Real-time analysis of BTC perpetual futures.

<b>Commands</b>
/analysis - Complete trading analysis
/price - Current Bitcoin price
/funding - Current funding rate
/help - Show help

Or just type \"analyze\", \"check btc\" or \"what's the signal?\"

⚠️ <i>Educational purposes only. Do your own research before trading.</i>";

pub const HELP: &str = "📊 <b>Help</b>

<b>Commands</b>
/start - Welcome message
/analysis - Complete trading analysis
/price - Current Bitcoin price only
/funding - Funding rate details
/help - This message

<b>Natural language</b>
\"analyze\", \"what's the signal?\", \"should I buy?\"
\"check btc\", \"btc price\"
\"funding rate\"

<b>Strategies</b>
1. 🚀 Momentum Breakout - Bollinger bands + RSI + volume
2. 🔄 Mean Reversion - statistical extremes
3. ⚡ Funding Arbitrage - extreme funding rates
4. 🎯 Liquidation Hunt - estimated liquidation clusters (heuristic)";

pub const UNRECOGNIZED: &str = "🤔 I didn't understand that. Try:
/analysis for a complete analysis
/price for the current price
/help for all commands";

pub const ANALYZING: &str = "🔄 Analyzing Bitcoin perpetual futures...";

pub fn analysis(result: &AnalysisResult, periods_per_day: u32) -> String {
    let snap = &result.snapshot;
    let ind = &result.indicators;
    let mut msg = format!(
        "📊 <b>Bitcoin Perpetual Futures Analysis</b>\n<i>{}</i>\n\n",
        result.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    msg.push_str("💰 <b>Market</b>\n");
    msg.push_str(&format!("• Price: <code>${}</code> ({})\n", usd(snap.price, 2), snap.source));
    if let Some(change) = snap.price_change_24h_pct {
        msg.push_str(&format!("• 24h change: {:+.2}%\n", change));
    }
    msg.push_str(&format!("• 24h volume: ${}\n", usd(snap.volume_24h, 0)));
    if let Some(oi) = snap.open_interest {
        msg.push_str(&format!("• Open interest: {} BTC\n", usd(oi, 0)));
    }
    msg.push_str(&format!("• Funding: {}\n", funding_line(snap, periods_per_day)));
    msg.push_str(&format!(
        "• RSI {:.1} | z {:+.2} | vol {:.2}% ann.\n",
        ind.rsi,
        ind.zscore,
        ind.annualized_volatility * Decimal::ONE_HUNDRED
    ));

    msg.push_str("\n📈 <b>Strategies</b>\n");
    for signal in &result.signals {
        msg.push_str(&strategy_block(signal));
    }

    msg.push_str("\n🎯 <b>Recommended</b>\n");
    match result.recommended() {
        Some(best) => msg.push_str(&recommendation(best)),
        None => msg.push_str("No setup right now. Stay flat.\n"),
    }

    msg.push_str("\n⚠️ <i>Educational purposes only. DYOR before trading.</i>");
    msg
}

pub fn price(snap: &MarketSnapshot) -> String {
    let mut msg = format!(
        "💰 <b>Bitcoin Price</b>\n\n<b>${}</b>\n",
        usd(snap.price, 2)
    );
    if let Some(change) = snap.price_change_24h_pct {
        let arrow = if change >= Decimal::ZERO { "📈" } else { "📉" };
        msg.push_str(&format!("{} 24h: {:+.2}%\n", arrow, change));
    }
    msg.push_str(&format!("Volume 24h: ${}\n", usd(snap.volume_24h, 0)));
    msg.push_str(&format!(
        "\n<i>Source: {} at {}</i>",
        snap.source,
        snap.timestamp.format("%H:%M:%S UTC")
    ));
    msg
}

pub fn funding(snap: &MarketSnapshot, periods_per_day: u32) -> String {
    let (Some(rate), Some(annual)) = (snap.funding_rate, snap.annualized_funding(periods_per_day)) else {
        return "⚡ <b>Bitcoin Funding Rate</b>\n\nFunding rate unavailable: no perpetual venue answered.".to_string();
    };

    let hundred = Decimal::ONE_HUNDRED;
    let daily = (rate * Decimal::from(periods_per_day) * hundred).round_dp(3);
    let annual_pct = (annual * hundred).round_dp(1);

    let (flow, recommendation) = if rate > Decimal::ZERO {
        ("📈 <b>Longs pay shorts</b>", "Consider SHORT positions for funding income")
    } else if rate < Decimal::ZERO {
        ("📉 <b>Shorts pay longs</b>", "Consider LONG positions for funding income")
    } else {
        ("⚖️ <b>Neutral funding</b>", "No funding arbitrage opportunity")
    };

    let level = match annual_pct.abs() {
        a if a > dec!(20) => "🔥 EXTREME",
        a if a > dec!(10) => "⚡ HIGH",
        a if a > dec!(5) => "📊 MODERATE",
        _ => "😐 LOW",
    };

    let mut msg = format!(
        "⚡ <b>Bitcoin Funding Rate</b>\n\n\
        Current: <code>{:.6}</code>\n\
        Daily: {:.3}%\n\
        Annualized: {:.1}%\n\n\
        {}\n\
        Opportunity: {}\n\
        {}\n",
        rate, daily, annual_pct, flow, level, recommendation
    );
    if let Some(next) = snap.next_funding_time {
        let minutes = (next - Utc::now()).num_minutes().max(0);
        msg.push_str(&format!("\nNext funding in ~{}h {}m", minutes / 60, minutes % 60));
    }
    let source = snap.funding_source.unwrap_or(snap.source);
    msg.push_str(&format!("\n<i>Source: {}</i>", source));
    msg
}

/// User-facing text for a failed request. Internal detail stays in the logs.
pub fn error(err: &BotError) -> String {
    match err {
        BotError::DataUnavailable { tried, .. } => {
            let names: Vec<String> = tried.iter().map(|p| p.to_string()).collect();
            format!(
                "⚠️ Market data temporarily unavailable (tried {}). Please try again in a minute.",
                names.join(", ")
            )
        }
        BotError::Timeout(_) => {
            "⚠️ Market data temporarily unavailable (providers too slow). Please try again in a minute.".to_string()
        }
        BotError::InsufficientData { required, available } => format!(
            "⚠️ Not enough price history for the indicators ({} of {} hours). Please try again later.",
            available, required
        ),
        _ => "❌ Analysis failed. Please try again later.".to_string(),
    }
}

fn strategy_block(signal: &Signal) -> String {
    let mut block = format!(
        "\n{} <b>{}</b>: {}",
        emoji(signal.strategy()),
        signal.strategy(),
        direction_label(signal.direction())
    );
    if let Some(plan) = signal.plan() {
        block.push_str(&format!(
            " ({:.0}%, {})\n   {:.1}x, R/R {:.2}\n",
            signal.confidence() * Decimal::ONE_HUNDRED,
            signal.confidence_tier(),
            plan.leverage,
            plan.risk_reward
        ));
    } else {
        block.push('\n');
    }
    if let Some(reason) = signal.rationale().first() {
        block.push_str(&format!("   {}\n", escape(reason)));
    }
    block
}

fn recommendation(signal: &Signal) -> String {
    let Some(plan) = signal.plan() else {
        return String::new();
    };
    let levels = &plan.levels;
    let mut targets = vec![levels.take_profit()];
    targets.extend(levels.extra_targets().iter().take(1));
    let targets: Vec<String> = targets.iter().map(|t| format!("${}", usd(*t, 2))).collect();

    let mut msg = format!(
        "<b>{}</b> {}\n\
        Entry: <code>${}</code>\n\
        Stop: <code>${}</code>\n\
        Targets: {}\n\
        Leverage: {:.1}x (liq. ~${})\n\
        Size: {} BTC, margin ${}\n\
        Max risk: ${}\n\
        Confidence: {:.0}%\n",
        direction_label(signal.direction()),
        signal.strategy(),
        usd(levels.entry_price(), 2),
        usd(levels.stop_loss(), 2),
        targets.join(", "),
        plan.leverage,
        usd(plan.liquidation_price, 0),
        plan.position_size_btc,
        usd(plan.margin_usd, 2),
        usd(plan.max_risk_usd, 2),
        signal.confidence() * Decimal::ONE_HUNDRED,
    );
    if let Some(carry) = plan.funding_carry_pct {
        let kind = if carry >= Decimal::ZERO { "income" } else { "cost" };
        msg.push_str(&format!(
            "Funding {} over {}h: {:.3}%\n",
            kind,
            plan.hold_hours,
            carry.abs() * Decimal::ONE_HUNDRED
        ));
    }

    msg.push_str("\n💡 <b>Reasoning</b>\n");
    for reason in signal.rationale().iter().take(3) {
        msg.push_str(&format!("• {}\n", escape(reason)));
    }
    msg
}

fn funding_line(snap: &MarketSnapshot, periods_per_day: u32) -> String {
    match (snap.funding_rate, snap.annualized_funding(periods_per_day)) {
        (Some(rate), Some(annual)) => format!(
            "{}% / {}h ({}% ann.)",
            (rate * Decimal::ONE_HUNDRED).round_dp(4),
            24 / periods_per_day.max(1),
            (annual * Decimal::ONE_HUNDRED).round_dp(1)
        ),
        _ => "unavailable".to_string(),
    }
}

fn emoji(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Momentum => "🚀",
        StrategyKind::MeanReversion => "🔄",
        StrategyKind::FundingArbitrage => "⚡",
        StrategyKind::LiquidationHunt => "🎯",
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Long => "🟢 LONG",
        Direction::Short => "🔴 SHORT",
        Direction::None => "⚪ NO SIGNAL",
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `1234567.891` with `dp = 2` -> `1,234,567.89`
pub fn usd(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp(dp);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.*}", dp as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{aggregate, StrategySet};
    use crate::config::{RiskConfig, StrategyConfig};
    use crate::types::{Indicators, ProviderKind};

    fn indicators() -> Indicators {
        Indicators {
            bollinger_upper: dec!(60600),
            bollinger_mid: dec!(60000),
            bollinger_lower: dec!(59400),
            rsi: dec!(50),
            zscore: dec!(0.1),
            volatility: dec!(0.003),
            annualized_volatility: dec!(0.28),
            volume_ratio: Some(Decimal::ONE),
            window: 20,
            observations: 200,
        }
    }

    fn snapshot(funding: Option<Decimal>) -> MarketSnapshot {
        let mut snap = MarketSnapshot::new(ProviderKind::Binance, dec!(60123.45), dec!(1234567890));
        snap.funding_rate = funding;
        snap
    }

    #[test]
    fn test_usd_grouping() {
        assert_eq!(usd(dec!(1234567.891), 2), "1,234,567.89");
        assert_eq!(usd(dec!(999), 0), "999");
        assert_eq!(usd(dec!(1000), 0), "1,000");
        assert_eq!(usd(dec!(-65000.5), 2), "-65,000.50");
        assert_eq!(usd(dec!(0.004), 2), "0.00");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn test_price_message() {
        let msg = price(&snapshot(None));
        assert!(msg.contains("$60,123.45"));
        assert!(msg.contains("Binance"));
    }

    #[test]
    fn test_funding_message_positive() {
        let msg = funding(&snapshot(Some(dec!(0.0009))), 3);
        assert!(msg.contains("Longs pay shorts"));
        assert!(msg.contains("98.6%"), "{}", msg);
        assert!(msg.contains("EXTREME"));
    }

    #[test]
    fn test_funding_message_absent() {
        let msg = funding(&snapshot(None), 3);
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_analysis_message() {
        let set = StrategySet::from_config(&StrategyConfig::default(), &RiskConfig::default());
        let snap = snapshot(Some(dec!(0.0009)));
        let ind = indicators();
        let result = aggregate(snap.clone(), ind.clone(), set.evaluate_all(&snap, &ind));
        let msg = analysis(&result, 3);

        for kind in StrategyKind::ALL {
            assert!(msg.contains(&kind.to_string()), "missing {}", kind);
        }
        assert!(msg.contains("NO SIGNAL"));
        assert!(msg.contains("SHORT</b> Funding Arbitrage"));
        assert!(msg.contains("Est. funding income"));
    }

    #[test]
    fn test_analysis_message_without_setups() {
        let snap = snapshot(None);
        let result = aggregate(
            snap,
            indicators(),
            StrategyKind::ALL.iter().map(|k| Signal::none(*k, "quiet")).collect(),
        );
        let msg = analysis(&result, 3);
        assert!(msg.contains("Stay flat"));
        assert!(msg.contains("Funding: unavailable"));
    }

    #[test]
    fn test_error_messages() {
        let err = BotError::DataUnavailable {
            tried: vec![ProviderKind::Binance, ProviderKind::Kraken],
            failures: vec![],
        };
        let msg = error(&err);
        assert!(msg.contains("temporarily unavailable"));
        assert!(msg.contains("Binance, Kraken"));

        let msg = error(&BotError::InsufficientData { required: 20, available: 5 });
        assert!(msg.contains("5 of 20"));
    }
}
