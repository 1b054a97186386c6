pub mod telegram;

use anyhow::Result;
use std::time::Duration;

use crate::compose::NotificationPayload;

pub use telegram::TelegramNotifier;

/// Delivery channel. `Ok` means the channel confirmed the message.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<()>;
    fn name(&self) -> &'static str;

    /// Longest one `send` can take, retries included, when the channel
    /// enforces that itself.
    fn delivery_budget(&self) -> Option<Duration> {
        None
    }
}

/// Writes payloads to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<()> {
        tracing::info!(target: "notify", text = %payload.text, "dry-run notification");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
