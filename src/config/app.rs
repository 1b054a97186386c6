// src/config/app.rs
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::document::DEFAULT_MAX_PAGES;
use crate::facts::DEFAULT_MAX_SCAN_CHARS;
use crate::fingerprint::FingerprintMode;
use crate::ingest::providers::bse_rss::DEFAULT_FEED_URL;
use crate::pipeline::{RunConfig, RunPolicy, DEFAULT_RUN_LIMIT};
use crate::taxonomy::ENV_TAXONOMY_CONFIG_PATH;

/// Service configuration, read once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub feed_url: String,
    pub run: RunConfig,
    pub document_max_pages: usize,
    pub max_scan_chars: usize,
    /// JSON-lines file for delivered fingerprints; in-memory when unset.
    pub fingerprint_store_path: Option<PathBuf>,
    pub taxonomy_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("feed_url", &self.feed_url)
            .field("run", &self.run)
            .field("document_max_pages", &self.document_max_pages)
            .field("max_scan_chars", &self.max_scan_chars)
            .field("fingerprint_store_path", &self.fingerprint_store_path)
            .field("taxonomy_path", &self.taxonomy_path)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Missing Telegram credentials and unparsable values are errors; everything
    /// else has a default.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // BOT_TOKEN / CHAT_ID are the names older deployments used
        let telegram_bot_token = non_empty("TELEGRAM_BOT_TOKEN")
            .or_else(|| non_empty("BOT_TOKEN"))
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;
        let telegram_chat_id = non_empty("TELEGRAM_CHAT_ID")
            .or_else(|| non_empty("CHAT_ID"))
            .ok_or_else(|| anyhow!("TELEGRAM_CHAT_ID must be set"))?;

        let limit: usize = parse_or(&non_empty, "RUN_LIMIT", DEFAULT_RUN_LIMIT)?;
        if limit == 0 {
            bail!("RUN_LIMIT must be at least 1");
        }
        let policy = match non_empty("RUN_POLICY").as_deref() {
            None => RunPolicy::Batch { limit },
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "batch" => RunPolicy::Batch { limit },
                "first" | "first_delivery" | "single" => RunPolicy::FirstDelivery,
                other => bail!("RUN_POLICY must be `batch` or `first`, got `{other}`"),
            },
        };

        let fingerprint_mode = match non_empty("FINGERPRINT_MODE") {
            None => FingerprintMode::default(),
            Some(raw) => FingerprintMode::parse(&raw).ok_or_else(|| {
                anyhow!("FINGERPRINT_MODE must be `title_link` or `title`, got `{raw}`")
            })?,
        };

        let run = RunConfig {
            policy,
            fingerprint_mode,
            feed_timeout: secs(&non_empty, "FEED_TIMEOUT_SECS", 15)?,
            document_timeout: secs(&non_empty, "DOCUMENT_TIMEOUT_SECS", 20)?,
            delivery_timeout: secs(&non_empty, "DELIVERY_TIMEOUT_SECS", 30)?,
        };

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            feed_url: non_empty("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            run,
            document_max_pages: parse_or(&non_empty, "DOCUMENT_MAX_PAGES", DEFAULT_MAX_PAGES)?,
            max_scan_chars: parse_or(&non_empty, "FACT_SCAN_MAX_CHARS", DEFAULT_MAX_SCAN_CHARS)?,
            fingerprint_store_path: non_empty("FINGERPRINT_STORE_PATH").map(PathBuf::from),
            taxonomy_path: non_empty(ENV_TAXONOMY_CONFIG_PATH).map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("{key}: invalid value `{raw}`: {e}")),
    }
}

fn secs<F>(get: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let v: u64 = parse_or(get, key, default)?;
    if v == 0 {
        bail!("{key} must be at least 1 second");
    }
    Ok(Duration::from_secs(v))
}
