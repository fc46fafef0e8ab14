//! Configuration
//!
//! Loaded once at startup from an optional TOML file and `PERPBOT__*`
//! environment variables, then passed by value into the components that need
//! it. Nothing here is mutated after load.

use crate::error::{BotError, Result};
use crate::types::ProviderKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENV_PREFIX: &str = "PERPBOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetcher: FetcherConfig,
    pub indicators: IndicatorConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Providers in the order they are tried
    pub providers: Vec<ProviderKind>,
    /// Bound on a single provider attempt
    pub provider_timeout_secs: u64,
    /// Bound on a whole fetch-compute-aggregate cycle
    pub cycle_timeout_secs: u64,
    /// Hourly bars requested from history endpoints
    pub history_limit: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderKind::Binance,
                ProviderKind::Coinbase,
                ProviderKind::Kraken,
                ProviderKind::CryptoCompare,
                ProviderKind::CoinGecko,
            ],
            provider_timeout_secs: 5,
            cycle_timeout_secs: 30,
            history_limit: 200,
        }
    }
}

impl FetcherConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Lookback window W for Bollinger, z-score and volatility
    pub window: usize,
    pub rsi_period: usize,
    pub bollinger_k: Decimal,
    /// 8760 for hourly bars
    pub periods_per_year: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            window: 20,
            rsi_period: 14,
            bollinger_k: dec!(2),
            periods_per_year: 24 * 365,
        }
    }
}

impl IndicatorConfig {
    /// Observations needed before anything is computed
    pub fn required_observations(&self) -> usize {
        self.window.max(self.rsi_period + 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    // Momentum breakout
    pub rsi_bullish: Decimal,
    pub rsi_bearish: Decimal,
    pub volume_spike_multiple: Decimal,

    // Mean reversion
    pub zscore_threshold: Decimal,
    pub rsi_overbought: Decimal,
    pub rsi_oversold: Decimal,

    // Funding arbitrage
    pub min_annualized_funding: Decimal,
    /// Annualized funding at which confidence saturates
    pub funding_saturation: Decimal,
    pub funding_periods_per_day: u32,
    pub funding_hold_hours: u32,

    // Liquidation hunt
    pub liquidation_leverage_tiers: Vec<u32>,
    pub liquidation_volume_spike: Decimal,
    /// Cluster counts as near within this many per-period standard deviations
    pub proximity_vol_multiple: Decimal,
    /// Upper bound on "near", as a fraction of price
    pub max_proximity: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            rsi_bullish: dec!(60),
            rsi_bearish: dec!(40),
            volume_spike_multiple: dec!(1.5),
            zscore_threshold: dec!(2.0),
            rsi_overbought: dec!(70),
            rsi_oversold: dec!(30),
            min_annualized_funding: dec!(0.15),
            funding_saturation: dec!(1.0),
            funding_periods_per_day: 3,
            funding_hold_hours: 24,
            liquidation_leverage_tiers: vec![3, 5, 10, 20, 50],
            liquidation_volume_spike: dec!(1.8),
            proximity_vol_multiple: dec!(3),
            max_proximity: dec!(0.04),
        }
    }
}

impl StrategyConfig {
    pub fn funding_period_hours(&self) -> u32 {
        24 / self.funding_periods_per_day.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Notional account used for sizing suggestions
    pub account_capital: Decimal,
    /// Fraction of capital at risk per trade
    pub max_position_risk: Decimal,
    pub max_leverage: Decimal,
    pub maintenance_margin: Decimal,
    pub stop_loss_pct: Decimal,
    pub take_profit_pcts: Vec<Decimal>,
    pub mean_reversion_stop_pct: Decimal,
    pub liquidation_stop_pct: Decimal,
    pub funding_leverage: Decimal,
    pub liquidation_leverage: Decimal,
    /// Bars per day, used to turn per-period volatility into daily volatility
    pub periods_per_day: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_capital: dec!(10000),
            max_position_risk: dec!(0.02),
            max_leverage: dec!(10),
            maintenance_margin: dec!(0.005),
            stop_loss_pct: dec!(0.04),
            take_profit_pcts: vec![dec!(0.03), dec!(0.06), dec!(0.10)],
            mean_reversion_stop_pct: dec!(0.015),
            liquidation_stop_pct: dec!(0.02),
            funding_leverage: dec!(5),
            liquidation_leverage: dec!(8),
            periods_per_day: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chats allowed to use the bot; empty means everyone
    #[serde(default)]
    pub allowed_chats: Vec<i64>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Config {
    /// Load from `path` (optional) and the environment.
    ///
    /// `.env` is read first so local development can keep the token out of the
    /// shell. `TELEGRAM_BOT_TOKEN` overrides `telegram.bot_token`.
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = shellexpand::tilde(path).into_owned();
        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("fetcher.providers")
                    .with_list_parse_key("telegram.allowed_chats")
                    .with_list_parse_key("strategy.liquidation_leverage_tiers")
                    .with_list_parse_key("risk.take_profit_pcts")
                    .try_parsing(true),
            )
            .set_override_option("telegram.bot_token", std::env::var("TELEGRAM_BOT_TOKEN").ok())?;

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(BotError::Config(msg.to_string()));
        let s = &self.strategy;

        if self.fetcher.providers.is_empty() {
            return fail("fetcher.providers must name at least one provider");
        }
        if self.fetcher.provider_timeout_secs == 0 || self.fetcher.cycle_timeout_secs == 0 {
            return fail("fetcher timeouts must be positive");
        }
        let attempts = self.fetcher.providers.len() as u64 + 1;
        if self.fetcher.cycle_timeout_secs < attempts * self.fetcher.provider_timeout_secs {
            return fail("fetcher.cycle_timeout_secs must cover every provider attempt plus one");
        }
        if self.indicators.window < 3 {
            return fail("indicators.window must be at least 3");
        }
        if self.indicators.rsi_period == 0 {
            return fail("indicators.rsi_period must be positive");
        }
        if self.fetcher.history_limit < self.indicators.required_observations() {
            return fail("fetcher.history_limit is shorter than the indicator window");
        }
        if self.strategy.rsi_bearish >= self.strategy.rsi_bullish {
            return fail("strategy.rsi_bearish must be below strategy.rsi_bullish");
        }
        let in_rsi_range = |v: Decimal| v > Decimal::ZERO && v < Decimal::ONE_HUNDRED;
        if ![s.rsi_bullish, s.rsi_bearish, s.rsi_overbought, s.rsi_oversold].into_iter().all(in_rsi_range) {
            return fail("strategy RSI thresholds must lie strictly between 0 and 100");
        }
        if self.strategy.rsi_oversold >= self.strategy.rsi_overbought {
            return fail("strategy.rsi_oversold must be below strategy.rsi_overbought");
        }
        if self.strategy.zscore_threshold <= Decimal::ZERO {
            return fail("strategy.zscore_threshold must be positive");
        }
        if self.strategy.funding_saturation <= Decimal::ZERO {
            return fail("strategy.funding_saturation must be positive");
        }
        let periods = self.strategy.funding_periods_per_day;
        if periods == 0 || 24 % periods != 0 {
            return fail("strategy.funding_periods_per_day must divide 24");
        }
        if self.strategy.liquidation_leverage_tiers.iter().any(|&l| l < 2) {
            return fail("strategy.liquidation_leverage_tiers must all be at least 2");
        }
        if self.risk.take_profit_pcts.is_empty() {
            return fail("risk.take_profit_pcts must not be empty");
        }
        if self.risk.max_leverage < Decimal::ONE {
            return fail("risk.max_leverage must be at least 1");
        }
        if let Some(tg) = &self.telegram {
            if tg.bot_token.trim().is_empty() {
                return fail("telegram.bot_token is empty");
            }
        }
        Ok(())
    }

    /// Log every recognized option once.
    pub fn log_summary(&self) {
        let providers: Vec<String> = self.fetcher.providers.iter().map(|p| p.to_string()).collect();
        tracing::info!(
            "fetcher: providers=[{}] provider_timeout={}s cycle_timeout={}s history_limit={}",
            providers.join(", "),
            self.fetcher.provider_timeout_secs,
            self.fetcher.cycle_timeout_secs,
            self.fetcher.history_limit,
        );
        tracing::info!(
            "indicators: window={} rsi_period={} bollinger_k={} periods_per_year={}",
            self.indicators.window,
            self.indicators.rsi_period,
            self.indicators.bollinger_k,
            self.indicators.periods_per_year,
        );
        let s = &self.strategy;
        tracing::info!(
            "strategy: rsi_bullish={} rsi_bearish={} volume_spike={} zscore={} rsi_overbought={} rsi_oversold={}",
            s.rsi_bullish, s.rsi_bearish, s.volume_spike_multiple, s.zscore_threshold, s.rsi_overbought, s.rsi_oversold,
        );
        tracing::info!(
            "strategy: min_annualized_funding={} funding_saturation={} funding_periods_per_day={} funding_hold_hours={}",
            s.min_annualized_funding, s.funding_saturation, s.funding_periods_per_day, s.funding_hold_hours,
        );
        tracing::info!(
            "strategy: liquidation_tiers={:?} liquidation_volume_spike={} proximity_vol_multiple={} max_proximity={}",
            s.liquidation_leverage_tiers, s.liquidation_volume_spike, s.proximity_vol_multiple, s.max_proximity,
        );
        let r = &self.risk;
        tracing::info!(
            "risk: capital={} max_position_risk={} max_leverage={} stop_loss={} take_profits={:?}",
            r.account_capital, r.max_position_risk, r.max_leverage, r.stop_loss_pct, r.take_profit_pcts,
        );
        match &self.telegram {
            Some(tg) => tracing::info!(
                "telegram: enabled, allowed_chats={}",
                if tg.allowed_chats.is_empty() { "any".to_string() } else { format!("{:?}", tg.allowed_chats) },
            ),
            None => tracing::info!("telegram: not configured"),
        }
    }
}
