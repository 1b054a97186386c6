//! Replays a saved BSE announcements feed through the full pipeline, printing
//! notifications to the log instead of sending them.
//!
//! Usage: `replay_fixture [FEED_XML] [--runs N]`
//! (default feed: `tests/fixtures/bse_announcements.xml`, one run).

use anyhow::{Context, Result};
use bse_disclosure_bot::document::NoDocuments;
use bse_disclosure_bot::fingerprint::MemoryFingerprintStore;
use bse_disclosure_bot::ingest::providers::bse_rss::BseRssProvider;
use bse_disclosure_bot::notify::LogNotifier;
use bse_disclosure_bot::pipeline::{RunConfig, RunPolicy};
use bse_disclosure_bot::taxonomy::Taxonomy;
use bse_disclosure_bot::RunController;
use std::path::PathBuf;

const DEFAULT_FIXTURE: &str = "tests/fixtures/bse_announcements.xml";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    bse_disclosure_bot::init_tracing();

    let mut path = PathBuf::from(DEFAULT_FIXTURE);
    let mut runs: usize = 1;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--runs" {
            let n = args.next().context("--runs needs a value")?;
            runs = n.parse().with_context(|| format!("--runs: invalid number '{n}'"))?;
        } else {
            path = PathBuf::from(arg);
        }
    }

    let xml = std::fs::read_to_string(&path)
        .with_context(|| format!("reading feed fixture {}", path.display()))?;
    let taxonomy = Taxonomy::load(
        std::env::var_os(bse_disclosure_bot::taxonomy::ENV_TAXONOMY_CONFIG_PATH)
            .map(PathBuf::from)
            .as_deref(),
    )?;

    // Replay looks at the whole file, not just the first batch.
    let cfg = RunConfig {
        policy: RunPolicy::Batch { limit: usize::MAX },
        ..RunConfig::default()
    };
    let mut controller = RunController::new(
        Box::new(BseRssProvider::from_fixture_str(&xml)),
        Box::new(NoDocuments),
        Box::new(LogNotifier),
        Box::new(MemoryFingerprintStore::new()),
        taxonomy,
        cfg,
    );

    for run in 1..=runs {
        let report = controller.run_once().await;
        println!("run {run}: {}", serde_json::to_string(&report)?);
    }
    Ok(())
}
