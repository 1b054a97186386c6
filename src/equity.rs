// src/equity.rs
//! Equity gate: only announcements carrying an exchange scrip code are listed equities.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SCRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)scrip\s*code\s*[:\-]?\s*(\d+)").expect("scrip regex"));

static RE_CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*category\s*:\s*(.+?)\s*$").expect("category regex"));

/// Scrip code as written in the text (kept as text, not parsed to a number).
pub fn extract_instrument_code(text: &str) -> Option<String> {
    RE_SCRIP
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The exchange's own category label, e.g. `Category: Dividend`.
pub fn extract_category_label(description: &str) -> Option<String> {
    RE_CATEGORY
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}
