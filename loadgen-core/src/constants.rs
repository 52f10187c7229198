use std::time::Duration;

/// Default length of a run
pub const DEFAULT_DURATION: Duration = Duration::from_secs(300);

/// Default target rate in requests per second
pub const DEFAULT_TARGET_RATE: f64 = 1_000.;

/// Default number of concurrent workers
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Default number of synthetic devices in the id pool
pub const DEFAULT_DEVICE_COUNT: usize = 20;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Status codes the ingestion service answers with when it takes a metric
pub const DEFAULT_ACCEPTED_STATUS: [u16; 2] = [200, 202];

/// Log a progress line every N submissions
pub const DEFAULT_PROGRESS_EVERY: u64 = 100;

/// Seconds of target-rate work the queue holds before admission feels backpressure
pub const QUEUE_DEPTH_SECS: usize = 5;

/// Lag behind the schedule cursor that is still dispatched rather than skipped.
///
/// Covers the resolution of the tokio timer wheel (1ms) with some headroom.
pub const TICK_LAG_TOLERANCE: Duration = Duration::from_millis(10);

pub const METRICS_PATH: &str = "/api/metrics";
pub const HEALTH_PATH: &str = "/health";
pub const ANOMALIES_PATH: &str = "/api/anomalies";
