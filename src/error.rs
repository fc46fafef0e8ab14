//! Error types

use crate::types::ProviderKind;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single market data provider.
///
/// These never leave the fetcher: the next provider in line is tried instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("access restricted (status {status})")]
    Restricted { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} not supported by this provider")]
    Unsupported(&'static str),
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("market data unavailable (tried: {})", format_tried(.tried))]
    DataUnavailable {
        tried: Vec<ProviderKind>,
        failures: Vec<(ProviderKind, String)>,
    },

    #[error("insufficient data: need {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("analysis cycle timed out after {0:?}")]
    Timeout(Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error("telegram error: {0}")]
    Telegram(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Whether the failure means "no market data right now" as opposed to a bug
    /// or misconfiguration.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BotError::DataUnavailable { .. } | BotError::Timeout(_))
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

fn format_tried(tried: &[ProviderKind]) -> String {
    if tried.is_empty() {
        return "none".to_string();
    }
    tried
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, BotError>;
