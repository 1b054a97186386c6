// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{FeedItem, FeedSource};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_total", "Total items parsed from the feed.");
        describe_counter!("feed_errors_total", "Feed fetch/parse errors and timeouts.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Line breaks become newlines, other tags are dropped
    static RE_BR: OnceCell<regex::Regex> = OnceCell::new();
    let re_br = RE_BR.get_or_init(|| regex::Regex::new(r"(?i)<br\s*/?>").unwrap());
    out = re_br.replace_all(&out, "\n").to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse horizontal whitespace, keep line structure
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[ \t\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fetch from the feed collaborator. Errors and timeouts surface as "no items".
pub async fn fetch_items(source: &dyn FeedSource, timeout: Duration) -> Vec<FeedItem> {
    ensure_metrics_described();

    match tokio::time::timeout(timeout, source.fetch_items()).await {
        Ok(Ok(items)) => {
            counter!("feed_items_total").increment(items.len() as u64);
            items
        }
        Ok(Err(e)) => {
            tracing::warn!(target: "ingest", error = ?e, provider = source.name(), "feed error");
            counter!("feed_errors_total").increment(1);
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                target: "ingest",
                provider = source.name(),
                timeout_ms = timeout.as_millis() as u64,
                "feed timed out"
            );
            counter!("feed_errors_total").increment(1);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    #[test]
    fn normalize_text_decodes_and_keeps_lines() {
        let s = "  Scrip Code:&nbsp; 500325 <br/>\n  Category:  Dividend  ";
        let out = normalize_text(s);
        assert_eq!(out, "Scrip Code: 500325\nCategory: Dividend");
    }

    #[test]
    fn normalize_text_keeps_punctuation() {
        assert_eq!(
            normalize_text("Outcome of Board Meeting - Q2 (Unaudited)."),
            "Outcome of Board Meeting - Q2 (Unaudited)."
        );
    }

    struct Broken;

    #[async_trait::async_trait]
    impl FeedSource for Broken {
        async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
            Err(anyhow!("xml parse failed"))
        }
        fn name(&self) -> &'static str {
            "Broken"
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl FeedSource for Slow {
        async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    #[tokio::test]
    async fn provider_error_becomes_no_items() {
        let items = fetch_items(&Broken, Duration::from_secs(1)).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn provider_timeout_becomes_no_items() {
        let items = fetch_items(&Slow, Duration::from_millis(20)).await;
        assert!(items.is_empty());
    }
}
