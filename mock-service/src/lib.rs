use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info, trace, warn};

/// CPU readings above this are counted as anomalies.
pub const ANOMALY_CPU_THRESHOLD: f64 = 85.;

/// How `/health` answers.
#[derive(Debug, Clone, Default)]
pub enum HealthMode {
    #[default]
    Healthy,
    /// Answer with this status and an error body.
    Status(u16),
    /// Answer healthy, but only after sleeping this long.
    Delay(Duration),
    /// Answer 200 with a body that is not JSON.
    Garbage,
}

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Base delay before `/api/metrics` answers.
    pub latency: Duration,
    /// Standard deviation of a normal jitter added to `latency`.
    pub jitter: Duration,
    /// Reject every n-th metric with `reject_status`, immediately.
    pub reject_every: Option<NonZeroU32>,
    pub reject_status: u16,
    /// Answer 429 once this many metrics per second have been accepted.
    pub max_tps: Option<NonZeroU32>,
    pub health: HealthMode,
    /// Make `/api/anomalies` answer 503.
    pub anomalies_down: bool,
}

impl MockConfig {
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn reject_every(mut self, n: u32, status: u16) -> Self {
        self.reject_every = NonZeroU32::new(n);
        self.reject_status = status;
        self
    }

    pub fn max_tps(mut self, tps: u32) -> Self {
        self.max_tps = NonZeroU32::new(tps);
        self
    }

    pub fn health(mut self, health: HealthMode) -> Self {
        self.health = health;
        self
    }

    pub fn anomalies_down(mut self) -> Self {
        self.anomalies_down = true;
        self
    }
}

/// Counters shared with whoever spawned the service.
#[derive(Debug, Default)]
pub struct MockState {
    /// Every POST to `/api/metrics`, whatever the answer.
    pub received: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub health_checks: AtomicU64,
    /// Anomalies seen since `/api/anomalies` was last read.
    anomalies: AtomicU64,
    tps: AtomicU64,
}

impl MockState {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> u64 {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Reset the one-second throughput counter, returning what it held.
    pub fn take_tps(&self) -> u64 {
        self.tps.swap(0, Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<MockConfig>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    jitter: Option<Normal<f64>>,
    counters: Arc<MockState>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    device_id: String,
    cpu: f64,
    rps: f64,
    memory: f64,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    device_id: String,
}

/// A running mock service bound to an ephemeral port.
pub struct MockService {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockService {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn router(config: MockConfig, counters: Arc<MockState>) -> Router {
    let limiter = config.max_tps.map(|tps| Arc::new(rate_limiter(tps)));
    let jitter = (!config.jitter.is_zero())
        .then(|| Normal::new(0., config.jitter.as_secs_f64()).ok())
        .flatten();

    let state = AppState {
        config: Arc::new(config),
        limiter,
        jitter,
        counters,
    };

    Router::new()
        .route("/api/metrics", post(ingest))
        .route("/health", get(health))
        .route("/api/anomalies", get(anomalies))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `127.0.0.1:0` and serve in the background.
pub async fn spawn(config: MockConfig) -> std::io::Result<MockService> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::default());
    let app = router(config, state.clone());

    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("Mock service stopped: {err}");
        }
    });
    debug!("Mock service listening on {addr}");

    Ok(MockService {
        addr,
        state,
        handle,
    })
}

pub async fn run(
    addr: SocketAddr,
    config: MockConfig,
    state: Arc<MockState>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config, state)).await?;
    Ok(())
}

async fn ingest(State(state): State<AppState>, Json(metric): Json<Metric>) -> Response {
    let counters = &state.counters;
    let n = counters.received.fetch_add(1, Ordering::SeqCst) + 1;
    counters.tps.fetch_add(1, Ordering::Relaxed);

    if metric.device_id.is_empty() {
        counters.rejected.fetch_add(1, Ordering::SeqCst);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "device_id is required" })),
        )
            .into_response();
    }

    if let Some(every) = state.config.reject_every {
        if n % u64::from(every.get()) == 0 {
            counters.rejected.fetch_add(1, Ordering::SeqCst);
            let status = StatusCode::from_u16(state.config.reject_status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, Json(json!({ "error": "rejected" }))).into_response();
        }
    }

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            counters.rejected.fetch_add(1, Ordering::SeqCst);
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }

    tokio::time::sleep(delay(&state)).await;

    if metric.cpu > ANOMALY_CPU_THRESHOLD {
        counters.anomalies.fetch_add(1, Ordering::SeqCst);
    }
    counters.accepted.fetch_add(1, Ordering::SeqCst);
    trace!(
        device = %metric.device_id,
        timestamp = metric.timestamp,
        rps = metric.rps,
        memory = metric.memory,
        "Accepted metric"
    );

    (
        StatusCode::ACCEPTED,
        Json(Accepted {
            status: "accepted",
            device_id: metric.device_id,
        }),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    state.counters.health_checks.fetch_add(1, Ordering::SeqCst);

    match &state.config.health {
        HealthMode::Healthy => Json(json!({ "status": "healthy" })).into_response(),
        HealthMode::Delay(delay) => {
            tokio::time::sleep(*delay).await;
            Json(json!({ "status": "healthy" })).into_response()
        }
        HealthMode::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
            (status, Json(json!({ "status": "unhealthy" }))).into_response()
        }
        HealthMode::Garbage => (StatusCode::OK, "definitely not json").into_response(),
    }
}

async fn anomalies(State(state): State<AppState>) -> Response {
    if state.config.anomalies_down {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let count = state.counters.anomalies.swap(0, Ordering::SeqCst);
    Json(json!({ "count": count, "anomalies": [] })).into_response()
}

fn delay(state: &AppState) -> Duration {
    let base = state.config.latency.as_secs_f64();
    let jitter = match &state.jitter {
        Some(normal) => normal.sample(&mut rand::thread_rng()),
        None => 0.,
    };
    Duration::from_secs_f64((base + jitter).max(0.))
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/// Print the accepted throughput once a second.
pub async fn tps_measure_task(state: Arc<MockState>) {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = state.take_tps();
        println!("{transactions} TPS");
    }
}
