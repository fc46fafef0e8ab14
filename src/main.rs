//! Bitcoin Perpetual Futures Signal Bot
//!
//! Telegram bot and command line front end for the analysis engine.

use btc_perp_bot::{
    analysis::Analyzer,
    config::Config,
    telegram::{format, TelegramBot},
    types::AnalysisResult,
};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "btc-perp-bot")]
#[command(about = "Bitcoin perpetual futures signal bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot
    Run,
    /// Run one analysis cycle and print it
    Analyze {
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current BTC price
    Price,
    /// Show the current funding rate
    Funding,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Analyze { json } => analyze(config, json).await,
        Commands::Price => show_price(config).await,
        Commands::Funding => show_funding(config).await,
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting BTC perpetual futures signal bot");
    config.log_summary();

    let Some(tg) = config.telegram.clone() else {
        anyhow::bail!("telegram.bot_token (or TELEGRAM_BOT_TOKEN) is required to run the bot");
    };

    let analyzer = Arc::new(Analyzer::from_config(&config)?);
    let bot = Arc::new(TelegramBot::new(tg, analyzer, config.strategy.funding_periods_per_day)?);

    tokio::select! {
        result = bot.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}

async fn analyze(config: Config, json: bool) -> anyhow::Result<()> {
    let analyzer = Analyzer::from_config(&config)?;
    let result = analyzer.get_analysis().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_analysis(&result);
    }
    Ok(())
}

async fn show_price(config: Config) -> anyhow::Result<()> {
    let snap = Analyzer::from_config(&config)?.snapshot().await?;

    println!("\n💰 BTC ${}", format::usd(snap.price, 2));
    if let Some(change) = snap.price_change_24h_pct {
        println!("   24h change: {:+.2}%", change);
    }
    println!("   24h volume: ${}", format::usd(snap.volume_24h, 0));
    println!("   source:     {}", snap.source);
    Ok(())
}

async fn show_funding(config: Config) -> anyhow::Result<()> {
    let snap = Analyzer::from_config(&config)?.snapshot().await?;
    let periods = config.strategy.funding_periods_per_day;

    match (snap.funding_rate, snap.annualized_funding(periods)) {
        (Some(rate), Some(annual)) => {
            println!("\n⚡ Funding rate: {:.6} per period", rate);
            println!("   annualized:   {}%", (annual * Decimal::ONE_HUNDRED).round_dp(1));
            if let Some(oi) = snap.open_interest {
                println!("   open interest: {} BTC", format::usd(oi, 0));
            }
            if let Some(next) = snap.next_funding_time {
                println!("   next funding: {}", next.format("%H:%M UTC"));
            }
            println!("   source:       {}", snap.funding_source.unwrap_or(snap.source));
        }
        _ => println!("\n⚡ Funding rate unavailable (no perpetual venue answered)"),
    }
    Ok(())
}

fn print_analysis(result: &AnalysisResult) {
    let snap = &result.snapshot;
    let ind = &result.indicators;

    println!("\n📊 BTC Perpetual Analysis ({})", result.generated_at.format("%Y-%m-%d %H:%M UTC"));
    println!("{}", "=".repeat(60));
    println!("Price:   ${} ({})", format::usd(snap.price, 2), snap.source);
    println!(
        "Bands:   ${} / ${} / ${}",
        format::usd(ind.bollinger_lower, 2),
        format::usd(ind.bollinger_mid, 2),
        format::usd(ind.bollinger_upper, 2)
    );
    println!(
        "RSI {:.1}  z {:+.2}  vol {:.2}% ann.",
        ind.rsi,
        ind.zscore,
        ind.annualized_volatility * Decimal::ONE_HUNDRED
    );

    for signal in &result.signals {
        println!("\n{:<20} {}", signal.strategy().to_string(), signal.direction());
        if let Some(plan) = signal.plan() {
            println!(
                "  conf {:.0}%  entry ${}  stop ${}  tp ${}  {:.1}x  R/R {:.2}",
                signal.confidence() * Decimal::ONE_HUNDRED,
                format::usd(plan.levels.entry_price(), 2),
                format::usd(plan.levels.stop_loss(), 2),
                format::usd(plan.levels.take_profit(), 2),
                plan.leverage,
                plan.risk_reward
            );
        }
        for reason in signal.rationale() {
            println!("  - {}", reason);
        }
    }

    match result.recommended() {
        Some(best) => println!("\n🎯 Recommended: {} {}", best.direction(), best.strategy()),
        None => println!("\n🎯 No setup right now"),
    }
}
