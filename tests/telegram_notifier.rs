// tests/telegram_notifier.rs
//
// TelegramNotifier against a local stand-in for the Bot API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value as Json;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json as AxumJson, Router,
};

use anyhow::Result;
use async_trait::async_trait;

use bse_disclosure_bot::compose::NotificationPayload;
use bse_disclosure_bot::document::NoDocuments;
use bse_disclosure_bot::fingerprint::MemoryFingerprintStore;
use bse_disclosure_bot::ingest::types::{FeedItem, FeedSource};
use bse_disclosure_bot::notify::{Notifier, TelegramNotifier};
use bse_disclosure_bot::pipeline::{RunConfig, RunStatus};
use bse_disclosure_bot::taxonomy::Taxonomy;
use bse_disclosure_bot::RunController;

#[derive(Clone, Default)]
struct BotApi {
    bodies: Arc<Mutex<Vec<Json>>>,
    /// Respond 500 to this many requests before succeeding
    fail_first: Arc<AtomicUsize>,
    reject: bool,
    /// Messages taken into the chat
    accepted: Arc<AtomicUsize>,
    /// Delay before answering an accepted message
    answer_after: Duration,
}

async fn send_message(
    State(api): State<BotApi>,
    AxumJson(body): AxumJson<Json>,
) -> (StatusCode, String) {
    api.bodies.lock().unwrap().push(body);
    if api.reject {
        return (
            StatusCode::BAD_REQUEST,
            r#"{"ok":false,"description":"Bad Request: chat not found"}"#.into(),
        );
    }
    if api.fail_first.load(Ordering::SeqCst) > 0 {
        api.fail_first.fetch_sub(1, Ordering::SeqCst);
        return (StatusCode::INTERNAL_SERVER_ERROR, "{}".into());
    }
    api.accepted.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(api.answer_after).await;
    (StatusCode::OK, r#"{"ok":true}"#.into())
}

async fn spawn_bot_api(api: BotApi) -> String {
    let app = Router::new()
        .route("/botTESTTOKEN/sendMessage", post(send_message))
        .with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = shuttle_axum::axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn payload() -> NotificationPayload {
    NotificationPayload {
        text: "💰 <b>Corporate Action</b>\n<b>Dividend</b>".into(),
        fact_lines: vec!["• Refer filing for details".into()],
        parse_mode: "HTML",
        disable_preview: true,
    }
}

#[tokio::test]
async fn telegram_posts_html_message_to_chat() {
    let api = BotApi::default();
    let base = spawn_bot_api(api.clone()).await;
    let n = TelegramNotifier::with_api_base(&base, "TESTTOKEN", "-1001234567890");

    n.send(&payload()).await.expect("delivered");

    let bodies = api.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["chat_id"], "-1001234567890");
    assert_eq!(bodies[0]["parse_mode"], "HTML");
    assert_eq!(bodies[0]["disable_web_page_preview"], true);
    assert_eq!(bodies[0]["text"], payload().text);
}

#[tokio::test]
async fn telegram_client_error_fails_without_retry() {
    let api = BotApi {
        reject: true,
        ..BotApi::default()
    };
    let base = spawn_bot_api(api.clone()).await;
    let n = TelegramNotifier::with_api_base(&base, "TESTTOKEN", "-1");

    let err = n.send(&payload()).await.expect_err("400 must fail");
    let msg = err.to_string();
    assert!(msg.contains("400"), "{msg}");
    assert!(msg.contains("chat not found"), "{msg}");
    assert_eq!(api.bodies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn telegram_server_error_is_retried() {
    let api = BotApi::default();
    api.fail_first.store(1, Ordering::SeqCst);
    let base = spawn_bot_api(api.clone()).await;
    let n = TelegramNotifier::with_api_base(&base, "TESTTOKEN", "-1")
        .with_timeout(Duration::from_secs(5))
        .with_retries(2);

    n.send(&payload()).await.expect("second attempt succeeds");
    assert_eq!(api.bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn telegram_unreachable_host_is_an_error() {
    let n = TelegramNotifier::with_api_base("http://127.0.0.1:9", "TESTTOKEN", "-1")
        .with_timeout(Duration::from_millis(500))
        .with_retries(1);
    assert!(n.send(&payload()).await.is_err());
}

#[tokio::test]
async fn telegram_response_timeout_is_not_resent() {
    let api = BotApi {
        answer_after: Duration::from_millis(600),
        ..BotApi::default()
    };
    let base = spawn_bot_api(api.clone()).await;
    let n = TelegramNotifier::with_api_base(&base, "TESTTOKEN", "-1")
        .with_timeout(Duration::from_millis(200))
        .with_retries(3);

    assert!(n.send(&payload()).await.is_err(), "no answer in time");
    assert_eq!(api.bodies.lock().unwrap().len(), 1, "sent exactly once");
}

struct OneAnnouncement;

#[async_trait]
impl FeedSource for OneAnnouncement {
    async fn fetch_items(&self) -> Result<Vec<FeedItem>> {
        Ok(vec![FeedItem {
            title: "Reliance Industries Ltd - Record Date for Interim Dividend".into(),
            link: "https://www.bseindia.com/xml-data/corpfiling/AttachLive/ril.pdf".into(),
            description: "Scrip Code: 500325".into(),
            published_at: None,
            document_url: None,
        }])
    }
    fn name(&self) -> &'static str {
        "one"
    }
}

#[tokio::test]
async fn slow_retry_within_budget_is_delivered_once() {
    // 500 first, then accepted with a reply that lands after the
    // configured delivery timeout has passed since the first attempt.
    let api = BotApi {
        answer_after: Duration::from_millis(800),
        ..BotApi::default()
    };
    api.fail_first.store(1, Ordering::SeqCst);
    let base = spawn_bot_api(api.clone()).await;

    let timeout = Duration::from_secs(1);
    let notifier = TelegramNotifier::with_api_base(&base, "TESTTOKEN", "-1")
        .with_timeout(timeout)
        .with_retries(3);
    let cfg = RunConfig {
        delivery_timeout: timeout,
        ..RunConfig::default()
    };
    let mut c = RunController::new(
        Box::new(OneAnnouncement),
        Box::new(NoDocuments),
        Box::new(notifier),
        Box::new(MemoryFingerprintStore::new()),
        Taxonomy::builtin(),
        cfg,
    );

    let first = c.run_once().await;
    assert_eq!(first.status, RunStatus::Ok);
    assert_eq!((first.posted, first.failed), (1, 0));

    let second = c.run_once().await;
    assert_eq!((second.posted, second.skipped_seen), (0, 1));
    assert_eq!(api.accepted.load(Ordering::SeqCst), 1);
}
