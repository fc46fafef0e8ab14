//! Telegram bot front end
//!
//! Long-polls `getUpdates` and answers /start, /help, /analysis, /price,
//! /funding and free text. Every inbound message is handled on its own task
//! so a slow analysis for one chat never blocks another.

pub mod format;
pub mod intent;

pub use intent::{classify, Intent};

use crate::analysis::Analyzer;
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TelegramBot {
    http: Client,
    api_url: String,
    config: TelegramConfig,
    analyzer: Arc<Analyzer>,
    funding_periods_per_day: u32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct SendChatAction {
    chat_id: i64,
    action: &'static str,
}

#[derive(Debug, Serialize)]
struct BotCommand {
    command: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct SetMyCommands {
    commands: Vec<BotCommand>,
}

impl TelegramBot {
    pub fn new(config: TelegramConfig, analyzer: Arc<Analyzer>, funding_periods_per_day: u32) -> Result<Self> {
        // Requests must outlive the long-poll window
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            http,
            api_url: format!("{}/bot{}", API_BASE, config.bot_token),
            config,
            analyzer,
            funding_periods_per_day,
        })
    }

    /// Registers the command menu, then polls until the process is stopped.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if let Err(e) = self.register_commands().await {
            tracing::warn!("Failed to register bot commands: {}", e);
        }
        tracing::info!("Telegram bot polling for updates");

        let mut offset = 0;
        loop {
            let updates = match self.poll_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(Message { chat, text: Some(text) }) = update.message else {
                    continue;
                };
                if !self.is_allowed(chat.id) {
                    tracing::warn!("Ignoring message from chat {} (not in allowed_chats)", chat.id);
                    continue;
                }

                let bot = Arc::clone(&self);
                tokio::spawn(async move {
                    bot.handle_message(chat.id, &text).await;
                });
            }
        }
    }

    fn is_allowed(&self, chat_id: i64) -> bool {
        self.config.allowed_chats.is_empty() || self.config.allowed_chats.contains(&chat_id)
    }

    async fn handle_message(&self, chat_id: i64, text: &str) {
        let intent = classify(text);
        tracing::info!("chat {}: {:?}", chat_id, intent);

        let reply = match intent {
            Intent::Start => format::WELCOME.to_string(),
            Intent::Help => format::HELP.to_string(),
            Intent::Unrecognized => format::UNRECOGNIZED.to_string(),
            Intent::Analysis => {
                self.send(chat_id, format::ANALYZING).await;
                self.typing(chat_id).await;
                match self.analyzer.get_analysis().await {
                    Ok(result) => format::analysis(&result, self.funding_periods_per_day),
                    Err(e) => self.failure(&e),
                }
            }
            Intent::Price => {
                self.typing(chat_id).await;
                match self.analyzer.snapshot().await {
                    Ok(snap) => format::price(&snap),
                    Err(e) => self.failure(&e),
                }
            }
            Intent::Funding => {
                self.typing(chat_id).await;
                match self.analyzer.snapshot().await {
                    Ok(snap) => format::funding(&snap, self.funding_periods_per_day),
                    Err(e) => self.failure(&e),
                }
            }
        };

        self.send(chat_id, &reply).await;
    }

    fn failure(&self, err: &BotError) -> String {
        if err.is_unavailable() {
            tracing::warn!("Request failed: {}", err);
        } else {
            tracing::error!("Request failed: {}", err);
        }
        format::error(err)
    }

    async fn poll_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: self.config.poll_timeout_secs,
                allowed_updates: &["message"],
            },
        )
        .await
    }

    async fn register_commands(&self) -> Result<()> {
        let commands = vec![
            BotCommand { command: "start", description: "Welcome message" },
            BotCommand { command: "analysis", description: "Complete trading analysis" },
            BotCommand { command: "price", description: "Current Bitcoin price" },
            BotCommand { command: "funding", description: "Current funding rate" },
            BotCommand { command: "help", description: "Show help" },
        ];
        let _: bool = self.call("setMyCommands", &SetMyCommands { commands }).await?;
        Ok(())
    }

    async fn send(&self, chat_id: i64, text: &str) {
        let request = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        if let Err(e) = self.call::<_, serde_json::Value>("sendMessage", &request).await {
            tracing::error!("Failed to send Telegram reply to {}: {}", chat_id, e);
        }
    }

    async fn typing(&self, chat_id: i64) {
        let request = SendChatAction { chat_id, action: "typing" };
        if let Err(e) = self.call::<_, bool>("sendChatAction", &request).await {
            tracing::debug!("sendChatAction failed: {}", e);
        }
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/{}", self.api_url, method);
        let response: ApiResponse<T> = self.http.post(&url).json(body).send().await?.json().await?;
        unwrap_response(method, response)
    }
}

fn unwrap_response<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
    match (response.ok, response.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(BotError::Telegram(format!(
            "{}: {}",
            method,
            response.description.unwrap_or_else(|| "no result".to_string())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"}, "text": "/price"}},
                {"update_id": 11, "edited_message": {"message_id": 1, "chat": {"id": 42}, "text": "x"}},
                {"update_id": 12, "message": {"message_id": 2, "chat": {"id": 42}, "photo": []}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        let updates = unwrap_response("getUpdates", response).unwrap();

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, 42);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/price"));
        assert!(updates[1].message.is_none());
        assert!(updates[2].message.as_ref().unwrap().text.is_none());
    }

    #[test]
    fn test_api_error_is_telegram_error() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        match unwrap_response("getUpdates", response) {
            Err(BotError::Telegram(msg)) => assert_eq!(msg, "getUpdates: Unauthorized"),
            other => panic!("expected Telegram error, got {:?}", other.map(|u| u.len())),
        }
    }

    #[test]
    fn test_send_message_body() {
        let body = serde_json::to_value(SendMessage {
            chat_id: 7,
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        })
        .unwrap();
        assert_eq!(body["chat_id"], 7);
        assert_eq!(body["parse_mode"], "HTML");
    }
}
