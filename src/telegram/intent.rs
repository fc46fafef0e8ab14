//! Maps an inbound message to what the user is asking for

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Start,
    Analysis,
    Price,
    Funding,
    Help,
    Unrecognized,
}

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "analysis",
    "signal",
    "should i buy",
    "should i sell",
    "trade",
    "trading",
    "strategy",
    "recommendation",
];

const PRICE_KEYWORDS: &[&str] = &["price", "btc", "bitcoin", "check btc"];

const FUNDING_KEYWORDS: &[&str] = &["funding", "arbitrage"];

const HELP_KEYWORDS: &[&str] = &["help", "commands"];

/// Classifies a slash command or free text.
///
/// Free text is matched case-insensitively; analysis keywords take
/// precedence over price keywords, which take precedence over funding.
pub fn classify(text: &str) -> Intent {
    let text = text.trim();

    if let Some(command) = text.strip_prefix('/') {
        // "/price@my_bot extra args" -> "price"
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        return match name.as_str() {
            "start" => Intent::Start,
            "help" => Intent::Help,
            "analysis" | "analyze" | "signal" => Intent::Analysis,
            "price" => Intent::Price,
            "funding" => Intent::Funding,
            _ => Intent::Unrecognized,
        };
    }

    let lower = text.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has(ANALYSIS_KEYWORDS) {
        Intent::Analysis
    } else if has(PRICE_KEYWORDS) {
        Intent::Price
    } else if has(FUNDING_KEYWORDS) {
        Intent::Funding
    } else if has(HELP_KEYWORDS) {
        Intent::Help
    } else {
        Intent::Unrecognized
    }
}
