use super::Notifier;
use crate::compose::NotificationPayload;
use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Headroom on top of the attempts and backoffs for body encoding and scheduling.
const BUDGET_SLACK: Duration = Duration::from_secs(1);

/// Posts payloads through the Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramNotifier {
    endpoint: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Self {
        Self::with_api_base(TELEGRAM_API_BASE, bot_token, chat_id)
    }

    /// Point at another Bot API server (tests, local bot-api).
    pub fn with_api_base(base: &str, bot_token: &str, chat_id: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}/bot{}/sendMessage", base.trim_end_matches('/'), bot_token),
            chat_id: chat_id.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn backoff_delay(attempt: u8) -> Duration {
        Duration::from_millis(500u64 << (attempt - 1))
    }

    async fn backoff(attempt: u8) {
        tokio::time::sleep(Self::backoff_delay(attempt)).await;
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &payload.text,
            parse_mode: payload.parse_mode,
            disable_web_page_preview: payload.disable_preview,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    let detail = rsp.text().await.unwrap_or_default();
                    // Only rate limits and server errors are worth another try
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.max_retries {
                        tracing::warn!(target: "notify", %status, attempt, "telegram retry");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("Telegram API error {status}: {detail}"));
                }
                Err(e) => {
                    // Past the connect phase Telegram may already have the message
                    if e.is_connect() && attempt < self.max_retries {
                        tracing::warn!(target: "notify", error = %e, attempt, "telegram retry");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("Telegram request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }

    fn delivery_budget(&self) -> Option<Duration> {
        let attempts = self.timeout * u32::from(self.max_retries);
        let backoffs: Duration = (1..self.max_retries).map(Self::backoff_delay).sum();
        Some(attempts + backoffs + BUDGET_SLACK)
    }
}
