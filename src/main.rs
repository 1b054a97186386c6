//! BSE disclosure bot: service entrypoint.
//! Boots the Axum HTTP server with the run controller and the metrics endpoint.
//!
//! See `README.md` for configuration.

use bse_disclosure_bot::api::{self, AppState};
use bse_disclosure_bot::config::AppConfig;
use bse_disclosure_bot::metrics::Metrics;
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    bse_disclosure_bot::init_tracing();

    // Missing credentials or a broken taxonomy stop the service here.
    let cfg = AppConfig::from_env()?;
    tracing::info!(config = ?cfg, "starting");

    let controller = bse_disclosure_bot::build_controller(&cfg)?;
    let metrics = Metrics::init(cfg.run.policy)?;

    let router = api::create_router(AppState::new(controller)).merge(metrics.router());

    Ok(router.into())
}
