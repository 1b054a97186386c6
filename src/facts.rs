// src/facts.rs
//! Best-effort figure extraction from filing text.
//!
//! Each label is a phrase followed, within a short window, by a number that
//! is not part of a word. A miss is an omission, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::equity::extract_instrument_code;

pub const DEFAULT_MAX_SCAN_CHARS: usize = 20_000;

/// Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FactLabel {
    Revenue,
    NetProfit,
    Ebitda,
    Eps,
    Dividend,
    RecordDate,
    ScripCode,
}

impl FactLabel {
    pub const ALL: [FactLabel; 7] = [
        FactLabel::Revenue,
        FactLabel::NetProfit,
        FactLabel::Ebitda,
        FactLabel::Eps,
        FactLabel::Dividend,
        FactLabel::RecordDate,
        FactLabel::ScripCode,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            FactLabel::Revenue => "Revenue",
            FactLabel::NetProfit => "Net Profit",
            FactLabel::Ebitda => "EBITDA",
            FactLabel::Eps => "EPS",
            FactLabel::Dividend => "Dividend",
            FactLabel::RecordDate => "Record Date",
            FactLabel::ScripCode => "Scrip Code",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedFacts {
    values: BTreeMap<FactLabel, String>,
}

impl ExtractedFacts {
    pub fn get(&self, label: FactLabel) -> Option<&str> {
        self.values.get(&label).map(String::as_str)
    }

    pub fn insert(&mut self, label: FactLabel, value: impl Into<String>) {
        self.values.insert(label, value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Present facts in label order.
    pub fn iter(&self) -> impl Iterator<Item = (FactLabel, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Characters after a label in which its figure must start.
const WINDOW_CHARS: usize = 40;

static RE_SIGNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("number regex"));
static RE_UNSIGNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("number regex"));

fn label(phrase: &str) -> Regex {
    Regex::new(&format!("(?i)(?:{phrase})")).expect("fact regex")
}

static RE_REVENUE: Lazy<Regex> = Lazy::new(|| {
    label(r"revenue\s+from\s+operations|total\s+income|total\s+revenue|revenue|turnover")
});
static RE_NET_PROFIT: Lazy<Regex> =
    Lazy::new(|| label(r"net\s+profit|net\s+loss|profit\s+after\s+tax|\bpat\b"));
static RE_EBITDA: Lazy<Regex> = Lazy::new(|| label(r"\bebitda\b"));
static RE_EPS: Lazy<Regex> =
    Lazy::new(|| label(r"earnings\s+per\s+(?:equity\s+)?share|\beps\b"));
static RE_DIVIDEND: Lazy<Regex> = Lazy::new(|| label(r"dividend"));

static RE_RECORD_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)record\s+date\D{0,40}?(\d{1,2}[-/]\d{1,2}[-/]\d{4})").expect("date regex")
});
static RE_RECORD_TEXTUAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)record\s+date\D{0,40}?(\d{1,2}(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+\d{4})",
    )
    .expect("date regex")
});

/// First number starting within the window after a label occurrence.
/// Numbers glued to a word (`Q2`, `FY26`, the `-26` of `2025-26`) are
/// stepped over, not taken.
fn first_figure(label: &Regex, number: &Regex, text: &str) -> Option<String> {
    label.find_iter(text).find_map(|lm| {
        let tail = &text[lm.end()..];
        let limit = tail
            .char_indices()
            .nth(WINDOW_CHARS)
            .map_or(tail.len(), |(i, _)| i);

        number
            .find_iter(tail)
            .take_while(|m| m.start() <= limit)
            .find_map(|m| {
                let at = lm.end() + m.start();
                let glued = text[..at]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_alphanumeric);
                if glued {
                    return None;
                }
                let v = m.as_str().trim_end_matches(',');
                (!v.is_empty() && v != "-").then(|| v.to_string())
            })
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

#[derive(Debug, Clone)]
pub struct FactExtractor {
    max_scan_chars: usize,
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCAN_CHARS)
    }
}

impl FactExtractor {
    pub fn new(max_scan_chars: usize) -> Self {
        Self { max_scan_chars }
    }

    pub fn extract(&self, text: &str) -> ExtractedFacts {
        let mut facts = ExtractedFacts::default();
        let text = self.scan_window(text);
        if text.trim().is_empty() {
            return facts;
        }

        let figures: [(FactLabel, &Lazy<Regex>, &Lazy<Regex>); 5] = [
            (FactLabel::Revenue, &RE_REVENUE, &RE_SIGNED),
            (FactLabel::NetProfit, &RE_NET_PROFIT, &RE_SIGNED),
            (FactLabel::Ebitda, &RE_EBITDA, &RE_SIGNED),
            (FactLabel::Eps, &RE_EPS, &RE_SIGNED),
            (FactLabel::Dividend, &RE_DIVIDEND, &RE_UNSIGNED),
        ];
        for (label, re, number) in figures {
            if let Some(v) = first_figure(re, number, text) {
                facts.insert(label, v);
            }
        }

        if let Some(d) = first_capture(&RE_RECORD_NUMERIC, text)
            .or_else(|| first_capture(&RE_RECORD_TEXTUAL, text))
        {
            facts.insert(FactLabel::RecordDate, d);
        }

        if let Some(code) = extract_instrument_code(text) {
            facts.insert(FactLabel::ScripCode, code);
        }

        tracing::debug!(target: "facts", found = facts.len(), scanned = text.len(), "facts extracted");
        facts
    }

    fn scan_window<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_scan_chars) {
            Some((i, _)) => &text[..i],
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex() -> FactExtractor {
        FactExtractor::default()
    }

    #[test]
    fn income_and_signed_profit() {
        let t = "...Total Income of Rs. 1,234.56 crore... Net Profit stood at Rs. -45.20 crore...";
        let f = ex().extract(t);
        assert_eq!(f.get(FactLabel::Revenue), Some("1,234.56"));
        assert_eq!(f.get(FactLabel::NetProfit), Some("-45.20"));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn revenue_only_leaves_others_absent() {
        let f = ex().extract("Revenue from operations: 5,000 lakhs");
        assert_eq!(f.get(FactLabel::Revenue), Some("5,000"));
        for label in FactLabel::ALL.into_iter().filter(|l| *l != FactLabel::Revenue) {
            assert_eq!(f.get(label), None, "{label:?} should be absent");
        }
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(ex().extract("").is_empty());
        assert!(ex().extract("   \n ").is_empty());
    }

    #[test]
    fn numbers_glued_to_words_are_stepped_over() {
        let f = ex().extract("Revenue from operations for Q2 FY26 stood at Rs 812.40 crore.");
        assert_eq!(f.get(FactLabel::Revenue), Some("812.40"));

        let f = ex().extract("Net Profit for FY2025-26 of Rs 77.1 crore");
        assert_eq!(f.get(FactLabel::NetProfit), Some("77.1"));
    }

    #[test]
    fn first_label_occurrence_wins_when_it_has_a_figure() {
        let f = ex().extract("Revenue for Q2 FY25 was Rs 812.4 crore. Revenue 900 later");
        assert_eq!(f.get(FactLabel::Revenue), Some("812.4"));
    }

    #[test]
    fn only_glued_numbers_fall_through_to_the_next_label() {
        let f = ex().extract("Revenue guidance for Q3 FY26 unchanged. Revenue: 1,050 crore");
        assert_eq!(f.get(FactLabel::Revenue), Some("1,050"));
    }

    #[test]
    fn ebitda_eps_dividend() {
        let t = "EBITDA: 310.5\nBasic EPS (Rs.) 12.34\nInterim Dividend of Rs. 8 per share";
        let f = ex().extract(t);
        assert_eq!(f.get(FactLabel::Ebitda), Some("310.5"));
        assert_eq!(f.get(FactLabel::Eps), Some("12.34"));
        assert_eq!(f.get(FactLabel::Dividend), Some("8"));
    }

    #[test]
    fn record_date_numeric_and_textual() {
        let f = ex().extract("The Record Date is fixed as 21/11/2025 for the purpose");
        assert_eq!(f.get(FactLabel::RecordDate), Some("21/11/2025"));

        let f = ex().extract("Record Date: Friday, 5th December, 2025");
        assert_eq!(f.get(FactLabel::RecordDate), Some("5th December, 2025"));

        let f = ex().extract("record date   15 Mar 2026");
        assert_eq!(f.get(FactLabel::RecordDate), Some("15 Mar 2026"));
    }

    #[test]
    fn window_is_bounded() {
        let filler = "x".repeat(60);
        let f = ex().extract(&format!("Revenue {filler} 1,000"));
        assert_eq!(f.get(FactLabel::Revenue), None);
    }

    #[test]
    fn scan_limit_hides_late_figures() {
        let t = format!("{} Net Profit 10", " ".repeat(100));
        assert!(FactExtractor::new(50).extract(&t).is_empty());
        assert_eq!(
            FactExtractor::new(500).extract(&t).get(FactLabel::NetProfit),
            Some("10")
        );
    }

    #[test]
    fn scrip_code_from_document() {
        let f = ex().extract("To, BSE Limited. Scrip Code: 532540. Sub: Outcome");
        assert_eq!(f.get(FactLabel::ScripCode), Some("532540"));
    }

    #[test]
    fn iteration_follows_label_order() {
        let mut f = ExtractedFacts::default();
        f.insert(FactLabel::RecordDate, "1-1-2026");
        f.insert(FactLabel::Revenue, "1");
        let labels: Vec<_> = f.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec![FactLabel::Revenue, FactLabel::RecordDate]);
    }
}
