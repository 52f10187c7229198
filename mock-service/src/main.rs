use mock_service::{run, tps_measure_task, MockConfig, MockState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let latency_ms: u64 = match std::env::var("MOCK_LATENCY_MS") {
        Ok(ms) => ms.parse()?,
        Err(_) => 10,
    };

    let config = MockConfig::default()
        .latency(Duration::from_millis(latency_ms))
        .jitter(Duration::from_millis(latency_ms / 4));
    let state = Arc::new(MockState::default());

    tokio::task::spawn(tps_measure_task(state.clone()));
    run(addr, config, state).await
}
