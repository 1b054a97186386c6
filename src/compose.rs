// src/compose.rs
//! Renders one Telegram-HTML notification per announcement.

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::equity::extract_category_label;
use crate::facts::{ExtractedFacts, FactLabel};
use crate::ingest::types::FeedItem;
use crate::taxonomy::Classification;

pub const FALLBACK_FACT_LINE: &str = "• Refer filing for details";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub text: String,
    /// The facts block as rendered; never empty.
    pub fact_lines: Vec<String>,
    pub parse_mode: &'static str,
    pub disable_preview: bool,
}

fn fact_line(label: FactLabel, value: &str) -> String {
    let value = encode_text(value);
    match label {
        FactLabel::RecordDate => format!("📅 {}: {}", label.display_name(), value),
        _ => format!("• {}: {}", label.display_name(), value),
    }
}

/// The facts block. The scrip code is left out when the header already shows it.
pub fn fact_lines(facts: &ExtractedFacts, instrument_code: Option<&str>) -> Vec<String> {
    let mut lines: Vec<String> = facts
        .iter()
        .filter(|(label, value)| !(*label == FactLabel::ScripCode && Some(*value) == instrument_code))
        .map(|(label, value)| fact_line(label, value))
        .collect();
    if lines.is_empty() {
        lines.push(FALLBACK_FACT_LINE.to_string());
    }
    lines
}

pub fn compose(
    item: &FeedItem,
    classification: &Classification<'_>,
    facts: &ExtractedFacts,
    instrument_code: Option<&str>,
) -> NotificationPayload {
    let category = classification.category;
    let mut out: Vec<String> = Vec::new();

    out.push(format!(
        "{} <b>{}</b>",
        category.emoji,
        encode_text(category.headline())
    ));
    if category.headline() != category.name {
        out.push(format!("<b>{}</b>", encode_text(&category.name)));
    }
    out.push(String::new());
    out.push(encode_text(item.title.trim()).to_string());
    out.push(String::new());

    if let Some(code) = instrument_code {
        out.push(format!("🏷 Scrip Code: {}", encode_text(code)));
    }
    if let Some(label) = extract_category_label(&item.description) {
        out.push(format!("🗂 Filed under: {}", encode_text(&label)));
    }

    let lines = fact_lines(facts, instrument_code);
    out.extend(lines.iter().cloned());

    out.push(String::new());
    out.push(format!(
        "<a href=\"{}\">View Filing</a>",
        encode_double_quoted_attribute(item.link.trim())
    ));

    NotificationPayload {
        text: out.join("\n"),
        fact_lines: lines,
        parse_mode: "HTML",
        disable_preview: true,
    }
}
