use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_PARSE: &str = "/actions/parse";
pub const PATH_RUN: &str = "/actions/run";

/// How an endpoint answers a well-formed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 200 with a JSON object carrying `success: true`.
    Healthy,
    /// 200 with a JSON object that has no `success` key.
    MissingSuccessField,
    /// 200 with a body that is not JSON.
    InvalidJson,
    /// The given status with a JSON error envelope.
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct EndpointBehavior {
    pub reply: Reply,
    /// Delay applied before answering.
    pub delay: Duration,
}

impl Default for EndpointBehavior {
    fn default() -> Self {
        Self {
            reply: Reply::Healthy,
            delay: Duration::ZERO,
        }
    }
}

impl EndpointBehavior {
    #[must_use]
    pub fn reply(reply: Reply) -> Self {
        Self {
            reply,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerOptions {
    pub parse: EndpointBehavior,
    pub run: EndpointBehavior,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    parse_requests_total: Arc<AtomicU64>,
    run_requests_total: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
    saw_mock_flag: Arc<AtomicU64>,
    invalid_bodies_total: Arc<AtomicU64>,
    request_ids: Arc<Mutex<Vec<String>>>,
}

impl TestServerStats {
    fn observe_headers(&self, headers: &HeaderMap) {
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            self.request_ids.lock().push(id.to_string());
        }
    }

    pub fn parse_requests_total(&self) -> u64 {
        self.parse_requests_total.load(Ordering::Relaxed)
    }

    pub fn run_requests_total(&self) -> u64 {
        self.run_requests_total.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.parse_requests_total() + self.run_requests_total()
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_mock_flag(&self) -> u64 {
        self.saw_mock_flag.load(Ordering::Relaxed)
    }

    pub fn invalid_bodies_total(&self) -> u64 {
        self.invalid_bodies_total.load(Ordering::Relaxed)
    }

    /// `X-Request-ID` header values in arrival order.
    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.lock().clone()
    }
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    action: String,
    #[serde(default)]
    arguments: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    mock: bool,
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    options: Arc<TestServerOptions>,
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn respond(behavior: &EndpointBehavior, ok_body: serde_json::Value) -> (StatusCode, Bytes) {
    match &behavior.reply {
        Reply::Healthy => (StatusCode::OK, Bytes::from(ok_body.to_string())),
        Reply::MissingSuccessField => {
            let mut body = ok_body;
            if let Some(obj) = body.as_object_mut() {
                obj.remove("success");
                obj.insert("result".to_string(), json!("ok"));
            }
            (StatusCode::OK, Bytes::from(body.to_string()))
        }
        Reply::InvalidJson => (StatusCode::OK, Bytes::from_static(b"<html>not json</html>")),
        Reply::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = json!({
                "ok": false,
                "error": { "code": "injected", "message": format!("status {code}") },
            });
            (status, Bytes::from(body.to_string()))
        }
    }
}

fn unprocessable(stats: &TestServerStats, message: &str) -> (StatusCode, Bytes) {
    stats.invalid_bodies_total.fetch_add(1, Ordering::Relaxed);
    let body = json!({
        "ok": false,
        "error": { "code": "validation_error", "message": message },
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Bytes::from(body.to_string()))
}

async fn handle_parse(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state
        .stats
        .parse_requests_total
        .fetch_add(1, Ordering::Relaxed);
    state.stats.observe_headers(&headers);

    let behavior = &state.options.parse;
    if !behavior.delay.is_zero() {
        sleep(behavior.delay).await;
    }

    let req: ParseRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return unprocessable(&state.stats, &err.to_string()),
    };

    // Rule-based parse of "get user <id> from <source>".
    let words: Vec<&str> = req.text.split_whitespace().collect();
    let (action, arguments) = match words.as_slice() {
        ["get", "user", identifier, "from", source] => (
            "get_user",
            json!({ "identifier": identifier, "source": source }),
        ),
        _ => ("unknown", json!({ "text": req.text })),
    };

    respond(
        behavior,
        json!({
            "success": true,
            "ok": true,
            "action": action,
            "data": { "action": action, "arguments": arguments, "parser": "rule" },
            "requestId": request_id(&headers),
        }),
    )
}

async fn handle_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Bytes) {
    state.stats.run_requests_total.fetch_add(1, Ordering::Relaxed);
    state.stats.observe_headers(&headers);

    let behavior = &state.options.run;
    if !behavior.delay.is_zero() {
        sleep(behavior.delay).await;
    }

    let req: RunRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(err) => return unprocessable(&state.stats, &err.to_string()),
    };
    if req.mock {
        state.stats.saw_mock_flag.fetch_add(1, Ordering::Relaxed);
    }

    respond(
        behavior,
        json!({
            "success": true,
            "ok": true,
            "data": { "action": req.action, "arguments": req.arguments, "mock": req.mock },
            "requestId": request_id(&headers),
        }),
    )
}

pub fn router(stats: TestServerStats, options: TestServerOptions) -> Router {
    let state = AppState {
        stats,
        options: Arc::new(options),
    };

    Router::new()
        .route(PATH_PARSE, post(handle_parse))
        .route(PATH_RUN, post(handle_run))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(options: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
