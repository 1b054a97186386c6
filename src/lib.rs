// src/lib.rs
// Public library surface for the service binary, tools and integration tests.

pub mod api;
pub mod config;
pub mod metrics;

// Core: dedup gate, equity gate, taxonomy, figures, rendering, run controller
pub mod compose;
pub mod equity;
pub mod facts;
pub mod fingerprint;
pub mod pipeline;
pub mod taxonomy;

// Collaborators: feed, filing text, delivery
pub mod document;
pub mod ingest;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::pipeline::{RunController, RunReport};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::document::PdfDocumentSource;
use crate::facts::FactExtractor;
use crate::fingerprint::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore};
use crate::ingest::providers::bse_rss::BseRssProvider;
use crate::notify::TelegramNotifier;
use crate::taxonomy::Taxonomy;

/// Tracing for binaries: `RUST_LOG` filter (default `info`), JSON lines when
/// `LOG_FORMAT=json`. A subscriber installed by the host runtime wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Wire the production collaborators (BSE feed, PDF filings, Telegram) from config.
pub fn build_controller(cfg: &AppConfig) -> Result<RunController> {
    let feed = BseRssProvider::from_url(cfg.feed_url.clone(), cfg.run.feed_timeout)?;
    let documents = PdfDocumentSource::new(cfg.run.document_timeout, cfg.document_max_pages)?;
    // Per attempt; the controller waits out the notifier's whole retry budget.
    let notifier = TelegramNotifier::new(&cfg.telegram_bot_token, cfg.telegram_chat_id.clone())
        .with_timeout(cfg.run.delivery_timeout);

    let store: Box<dyn FingerprintStore> = match &cfg.fingerprint_store_path {
        Some(p) => Box::new(FileFingerprintStore::open(p)?),
        None => Box::new(MemoryFingerprintStore::new()),
    };
    let taxonomy = Taxonomy::load(cfg.taxonomy_path.as_deref())?;

    info!(
        categories = taxonomy.categories().len(),
        policy = ?cfg.run.policy,
        fingerprint_mode = ?cfg.run.fingerprint_mode,
        durable_store = cfg.fingerprint_store_path.is_some(),
        "controller ready"
    );

    Ok(RunController::new(
        Box::new(feed),
        Box::new(documents),
        Box::new(notifier),
        store,
        taxonomy,
        cfg.run.clone(),
    )
    .with_extractor(FactExtractor::new(cfg.max_scan_chars)))
}
