// src/pipeline.rs
//! Run controller: one pass over the feed.
//!
//! Per item: malformed → skip, already delivered → skip, no scrip code → skip,
//! otherwise classify, pull figures from the filing when the category wants them,
//! compose, deliver. The fingerprint is committed only after the channel
//! confirmed delivery; a failed item is retried on the next run.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::compose::compose;
use crate::document::DocumentSource;
use crate::equity::extract_instrument_code;
use crate::facts::{ExtractedFacts, FactExtractor};
use crate::fingerprint::{fingerprint, FingerprintMode, FingerprintStore};
use crate::ingest::{
    self,
    types::{FeedItem, FeedSource},
};
use crate::notify::Notifier;
use crate::taxonomy::Taxonomy;

pub const DEFAULT_RUN_LIMIT: usize = 5;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Run trigger invocations.");
        describe_counter!("pipeline_posted_total", "Notifications confirmed delivered.");
        describe_counter!(
            "pipeline_skipped_total",
            "Items skipped, labelled by reason (malformed, seen, not_equity)."
        );
        describe_counter!(
            "pipeline_delivery_failures_total",
            "Deliveries that failed or timed out; retried next run."
        );
        describe_gauge!(
            "pipeline_delivered_fingerprints",
            "Fingerprints held by the delivery store after the last run."
        );
    });
}

/// How much of the feed one invocation may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunPolicy {
    /// Examine at most `limit` items in feed order.
    Batch { limit: usize },
    /// Walk the feed until one item is delivered.
    FirstDelivery,
}

impl Default for RunPolicy {
    fn default() -> Self {
        RunPolicy::Batch {
            limit: DEFAULT_RUN_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub policy: RunPolicy,
    pub fingerprint_mode: FingerprintMode,
    pub feed_timeout: Duration,
    pub document_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            policy: RunPolicy::default(),
            fingerprint_mode: FingerprintMode::default(),
            feed_timeout: Duration::from_secs(15),
            document_timeout: Duration::from_secs(20),
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    NoItems,
    Partial,
}

/// What the run trigger returns, also on partial failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub fetched: usize,
    pub processed: usize,
    pub posted: usize,
    pub skipped_seen: usize,
    pub skipped_non_equity: usize,
    pub skipped_malformed: usize,
    pub failed: usize,
}

impl RunReport {
    fn empty(fetched: usize) -> Self {
        Self {
            status: RunStatus::Ok,
            fetched,
            processed: 0,
            posted: 0,
            skipped_seen: 0,
            skipped_non_equity: 0,
            skipped_malformed: 0,
            failed: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_seen + self.skipped_non_equity + self.skipped_malformed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Malformed,
    Seen,
    NotEquity,
    Delivered,
    Failed,
}

impl ItemOutcome {
    fn skip_reason(self) -> Option<&'static str> {
        match self {
            ItemOutcome::Malformed => Some("malformed"),
            ItemOutcome::Seen => Some("seen"),
            ItemOutcome::NotEquity => Some("not_equity"),
            ItemOutcome::Delivered | ItemOutcome::Failed => None,
        }
    }
}

pub struct RunController {
    feed: Box<dyn FeedSource>,
    documents: Box<dyn DocumentSource>,
    notifier: Box<dyn Notifier>,
    store: Box<dyn FingerprintStore>,
    taxonomy: Taxonomy,
    extractor: FactExtractor,
    cfg: RunConfig,
}

impl RunController {
    pub fn new(
        feed: Box<dyn FeedSource>,
        documents: Box<dyn DocumentSource>,
        notifier: Box<dyn Notifier>,
        store: Box<dyn FingerprintStore>,
        taxonomy: Taxonomy,
        cfg: RunConfig,
    ) -> Self {
        Self {
            feed,
            documents,
            notifier,
            store,
            taxonomy,
            extractor: FactExtractor::default(),
            cfg,
        }
    }

    pub fn with_extractor(mut self, extractor: FactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    pub fn store(&self) -> &dyn FingerprintStore {
        self.store.as_ref()
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub async fn run_once(&mut self) -> RunReport {
        ensure_metrics_described();
        counter!("pipeline_runs_total").increment(1);

        let items = ingest::fetch_items(self.feed.as_ref(), self.cfg.feed_timeout).await;
        let mut report = RunReport::empty(items.len());
        if items.is_empty() {
            report.status = RunStatus::NoItems;
            tracing::info!(target: "pipeline", "no announcements");
            return report;
        }

        let limit = match self.cfg.policy {
            RunPolicy::Batch { limit } => limit,
            RunPolicy::FirstDelivery => usize::MAX,
        };

        for item in items.iter().take(limit) {
            report.processed += 1;
            let outcome = self.process_item(item).await;

            if let Some(reason) = outcome.skip_reason() {
                counter!("pipeline_skipped_total", "reason" => reason).increment(1);
            }
            match outcome {
                ItemOutcome::Malformed => report.skipped_malformed += 1,
                ItemOutcome::Seen => report.skipped_seen += 1,
                ItemOutcome::NotEquity => report.skipped_non_equity += 1,
                ItemOutcome::Delivered => {
                    report.posted += 1;
                    counter!("pipeline_posted_total").increment(1);
                }
                ItemOutcome::Failed => {
                    report.failed += 1;
                    counter!("pipeline_delivery_failures_total").increment(1);
                }
            }

            if self.cfg.policy == RunPolicy::FirstDelivery && outcome == ItemOutcome::Delivered {
                break;
            }
        }

        if report.failed > 0 {
            report.status = RunStatus::Partial;
        }
        gauge!("pipeline_delivered_fingerprints").set(self.store.len() as f64);

        tracing::info!(
            target: "pipeline",
            fetched = report.fetched,
            processed = report.processed,
            posted = report.posted,
            skipped = report.skipped(),
            failed = report.failed,
            "run finished"
        );
        report
    }

    pub async fn process_item(&mut self, item: &FeedItem) -> ItemOutcome {
        if item.is_malformed() {
            tracing::debug!(target: "pipeline", link = %item.link, "malformed item");
            return ItemOutcome::Malformed;
        }

        let fp = fingerprint(item, self.cfg.fingerprint_mode);
        if self.store.seen(&fp) {
            tracing::debug!(target: "pipeline", %fp, "already delivered");
            return ItemOutcome::Seen;
        }

        let Some(code) = extract_instrument_code(&item.description) else {
            tracing::debug!(target: "pipeline", title = %item.title, "no scrip code");
            return ItemOutcome::NotEquity;
        };

        let classification = self.taxonomy.classify(&item.title);
        let facts = match (&item.document_url, classification.category.extract_facts) {
            (Some(url), true) => self.document_facts(url).await,
            _ => ExtractedFacts::default(),
        };
        let payload = compose(item, &classification, &facts, Some(code.as_str()));

        tracing::debug!(
            target: "pipeline",
            scrip = %code,
            category = %classification.category.name,
            keyword = ?classification.keyword,
            facts = facts.len(),
            "composed"
        );

        let deadline = self.delivery_deadline();
        match timeout(deadline, self.notifier.send(&payload)).await {
            Ok(Ok(())) => {
                if let Err(e) = self.store.commit(fp) {
                    tracing::warn!(target: "pipeline", error = ?e, "fingerprint commit failed");
                }
                tracing::info!(
                    target: "pipeline",
                    scrip = %code,
                    category = %classification.category.name,
                    channel = self.notifier.name(),
                    "posted"
                );
                ItemOutcome::Delivered
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    target: "pipeline",
                    error = ?e,
                    scrip = %code,
                    channel = self.notifier.name(),
                    "delivery failed"
                );
                ItemOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    target: "pipeline",
                    scrip = %code,
                    channel = self.notifier.name(),
                    timeout_ms = deadline.as_millis() as u64,
                    "delivery timed out"
                );
                ItemOutcome::Failed
            }
        }
    }

    /// A channel that bounds its own retries is never cut off mid-retry: an
    /// attempt it already handed over would otherwise be sent again next run.
    fn delivery_deadline(&self) -> Duration {
        self.notifier
            .delivery_budget()
            .map_or(self.cfg.delivery_timeout, |b| b.max(self.cfg.delivery_timeout))
    }

    async fn document_facts(&self, url: &str) -> ExtractedFacts {
        let text = match timeout(self.cfg.document_timeout, self.documents.fetch_text(url)).await
        {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!(target: "pipeline", %url, "document fetch timed out");
                String::new()
            }
        };
        self.extractor.extract(&text)
    }
}
