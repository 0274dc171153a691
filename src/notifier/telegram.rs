use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::notifier::{Notifier, NotifierError};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct GetMeResponse {
    ok: bool,
    #[serde(default)]
    result: Option<BotInfo>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    username: Option<String>,
}

/// Telegram Bot API push transport.
pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        api_url: &str,
        token: &str,
        chat_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let http = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            http,
            base_url: format!("{api_url}/bot{token}"),
            chat_id: chat_id.into(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str) -> Result<(), NotifierError> {
        let response = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::Rejected(format!("{status}: {body}")));
        }

        debug!("telegram message delivered");
        Ok(())
    }

    async fn test_connection(&self) -> Result<(), NotifierError> {
        let response = self
            .http
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        let me: GetMeResponse = response.json().await?;
        if !me.ok {
            return Err(NotifierError::Rejected("getMe returned ok=false".into()));
        }

        let bot = me
            .result
            .and_then(|b| b.username)
            .unwrap_or_else(|| "unknown".into());
        info!(bot = %bot, "telegram connection verified");

        Ok(())
    }
}
