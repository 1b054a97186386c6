// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET / and GET /health
// - GET /run and POST /run against the saved feed fixture
// - unknown routes

use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use bse_disclosure_bot::api::{self, AppState};
use bse_disclosure_bot::document::NoDocuments;
use bse_disclosure_bot::fingerprint::MemoryFingerprintStore;
use bse_disclosure_bot::ingest::providers::bse_rss::BseRssProvider;
use bse_disclosure_bot::notify::LogNotifier;
use bse_disclosure_bot::pipeline::RunConfig;
use bse_disclosure_bot::taxonomy::Taxonomy;
use bse_disclosure_bot::RunController;

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const BSE_XML: &str = include_str!("fixtures/bse_announcements.xml");

/// Build the same Router the binary uses, with offline collaborators.
fn test_router() -> Router {
    let controller = RunController::new(
        Box::new(BseRssProvider::from_fixture_str(BSE_XML)),
        Box::new(NoDocuments),
        Box::new(LogNotifier),
        Box::new(MemoryFingerprintStore::new()),
        Taxonomy::builtin(),
        RunConfig::default(),
    );
    api::router(AppState::new(controller))
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, json)
}

#[tokio::test]
async fn api_health_and_root_report_live() {
    for uri in ["/", "/health"] {
        let (status, body) = call(test_router(), "GET", uri).await;
        assert_eq!(status, StatusCode::OK, "{uri} should be 200");
        assert_eq!(body["status"], "Bot Live", "{uri} body");
    }
}

#[tokio::test]
async fn api_run_returns_report_and_dedups_on_repeat() {
    let app = test_router();

    let (status, first) = call(app.clone(), "GET", "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "ok");
    assert_eq!(first["fetched"], 7);
    assert_eq!(first["processed"], 5);
    assert_eq!(first["posted"], 3);
    assert_eq!(first["skipped_non_equity"], 1);
    assert_eq!(first["skipped_malformed"], 1);
    assert_eq!(first["failed"], 0);

    // Same controller behind the shared state: nothing new to post.
    let (status, second) = call(app, "POST", "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["posted"], 0);
    assert_eq!(second["skipped_seen"], 3);
}

#[tokio::test]
async fn api_unknown_route_is_404() {
    let (status, _) = call(test_router(), "GET", "/analyze").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
