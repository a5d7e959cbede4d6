use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_STATUS: &str = "/status";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_FLAKY: &str = "/flaky";
pub const PATH_ERROR: &str = "/error";

pub const SERVER_NAME: &str = "pingr-testserver";

const DEFAULT_SLOW_MS: u64 = 50;
const DEFAULT_FLAKY_EVERY: u64 = 2;

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    flaky_seen: Arc<AtomicU64>,
    failures_served: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_failures_served(&self) {
        self.failures_served.fetch_add(1, Ordering::Relaxed);
    }

    /// 1-based ordinal of this `/flaky` hit.
    fn next_flaky(&self) -> u64 {
        self.flaky_seen.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failures_served(&self) -> u64 {
        self.failures_served.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    pub base_url: String,
    pub status: String,
    pub slow: String,
    pub flaky: String,
    pub error: String,
}

impl TestServerUrls {
    pub fn new(base_url: String) -> Self {
        Self {
            status: format!("{base_url}{PATH_STATUS}"),
            slow: format!("{base_url}{PATH_SLOW}"),
            flaky: format!("{base_url}{PATH_FLAKY}"),
            error: format!("{base_url}{PATH_ERROR}"),
            base_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    requests: u64,
}

#[derive(Debug, Deserialize)]
struct SlowParams {
    ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FlakyParams {
    every: Option<u64>,
}

async fn handle_status(State(stats): State<TestServerStats>) -> impl IntoResponse {
    stats.inc_requests_total();
    let body = StatusBody {
        status: "ok",
        requests: stats.requests_total(),
    };
    ([(header::SERVER, SERVER_NAME)], Json(body))
}

async fn handle_slow(
    State(stats): State<TestServerStats>,
    Query(params): Query<SlowParams>,
) -> impl IntoResponse {
    stats.inc_requests_total();
    sleep(Duration::from_millis(params.ms.unwrap_or(DEFAULT_SLOW_MS))).await;
    ([(header::SERVER, SERVER_NAME)], "slow")
}

// Every `every`-th hit answers 500, the rest 200.
async fn handle_flaky(
    State(stats): State<TestServerStats>,
    Query(params): Query<FlakyParams>,
) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    let every = params.every.unwrap_or(DEFAULT_FLAKY_EVERY).max(1);
    if stats.next_flaky() % every == 0 {
        stats.inc_failures_served();
        (StatusCode::INTERNAL_SERVER_ERROR, "flaky")
    } else {
        (StatusCode::OK, "ok")
    }
}

async fn handle_error(State(stats): State<TestServerStats>) -> (StatusCode, &'static str) {
    stats.inc_requests_total();
    stats.inc_failures_served();
    (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_STATUS, get(handle_status))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_FLAKY, get(handle_flaky))
        .route(PATH_ERROR, get(handle_error))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        let base_url = format!("http://{addr}");
        let urls = TestServerUrls::new(base_url.clone());

        Ok(Self {
            addr,
            base_url,
            urls,
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

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
