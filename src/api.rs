use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::pipeline::{RunController, RunReport};

/// The controller sits behind one mutex: concurrent run triggers queue up,
/// so the fingerprint store is never touched by two runs at once.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<Mutex<RunController>>,
}

impl AppState {
    pub fn new(controller: RunController) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    pub fn controller(&self) -> Arc<Mutex<RunController>> {
        self.controller.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/run", get(run).post(run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Alias kept for callers that build the router by the short name.
pub fn router(state: AppState) -> Router {
    create_router(state)
}

#[derive(serde::Serialize)]
struct HealthResp {
    status: &'static str,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "Bot Live" })
}

async fn run(State(state): State<AppState>) -> Json<RunReport> {
    let mut controller = state.controller.lock().await;
    Json(controller.run_once().await)
}
