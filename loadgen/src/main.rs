use clap::Parser;
use loadgen::prelude::*;
use loadgen_core::{
    DEFAULT_ACCEPTED_STATUS, DEFAULT_DEVICE_COUNT, DEFAULT_POOL_SIZE, DEFAULT_PROGRESS_EVERY,
    DEFAULT_TARGET_RATE,
};
#[cfg(feature = "metrics")]
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Constant-rate load generator for a metrics ingestion service")]
struct Cli {
    /// Base URL of the ingestion service
    #[arg(short, long, env = "LOADGEN_BASE_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Target requests per second
    #[arg(short, long, env = "LOADGEN_RATE", default_value_t = DEFAULT_TARGET_RATE)]
    rate: f64,

    /// How long to generate load for (e.g. `30s`, `5m`)
    #[arg(short, long, env = "LOADGEN_DURATION", default_value = "5m", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Number of concurrent workers
    #[arg(short, long, env = "LOADGEN_WORKERS", default_value_t = DEFAULT_POOL_SIZE)]
    workers: usize,

    /// Size of the synthetic device id pool
    #[arg(long, default_value_t = DEFAULT_DEVICE_COUNT)]
    devices: usize,

    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,

    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    probe_timeout: Duration,

    /// Status codes counted as an accepted metric
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_ACCEPTED_STATUS)]
    accept: Vec<u16>,

    /// Work queue bound; defaults to five seconds of target-rate work
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Log progress every N submissions (0 disables)
    #[arg(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: u64,

    /// Serve Prometheus metrics on this address while the test runs
    #[cfg(feature = "metrics")]
    #[arg(long, env = "LOADGEN_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = RunConfig::new(&self.url)?
            .rate(self.rate)
            .duration(self.duration)
            .pool_size(self.workers)
            .devices(self.devices)
            .request_timeout(self.request_timeout)
            .probe_timeout(self.probe_timeout)
            .accepted_status(&self.accept)
            .progress_every(self.progress_every);

        if let Some(capacity) = self.queue_capacity {
            config = config.queue_capacity(capacity);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loadgen=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Serving metrics at http://{addr}");
    }

    let test = LoadTest::new(cli.run_config()?)?;
    let interrupts = listen_for_interrupts();
    let report = test
        .run_until_or_abort(interrupt(interrupts.clone(), 1), interrupt(interrupts, 2))
        .await?;

    println!("{report}");
    if report.schedule.interrupted {
        warn!("Run was interrupted; the report covers only what completed.");
    }
    Ok(())
}

/// Count Ctrl-C presses for the lifetime of the process.
fn listen_for_interrupts() -> watch::Receiver<u32> {
    let (tx, rx) = watch::channel(0);
    tokio::spawn(async move {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tx.send_modify(|presses| *presses += 1),
                Err(err) => {
                    warn!("Unable to listen for interrupts: {err}");
                    break;
                }
            }
        }
    });
    rx
}

/// Resolves on the `nth` interrupt. The first stops admission, the second abandons the drain.
async fn interrupt(mut presses: watch::Receiver<u32>, nth: u32) {
    if presses.wait_for(|n| *n >= nth).await.is_err() {
        std::future::pending::<()>().await;
    }
    match nth {
        1 => info!("Interrupt received, stopping admission (press Ctrl-C again to abort)"),
        _ => warn!("Second interrupt received, abandoning in-flight requests"),
    }
}
