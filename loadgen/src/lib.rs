#![cfg_attr(docsrs, feature(doc_cfg))]
//! Constant-rate load generator for metrics ingestion services.
//!
//! A [`LoadTest`] probes the service's `/health` endpoint, then posts synthetic device
//! metrics to `/api/metrics` on a fixed schedule through a bounded pool of workers, and
//! finally summarizes throughput, latency and the service's own anomaly count in a
//! [`Report`].

pub mod aggregator;
mod error;
pub mod executor;
pub mod metric_sampler;
pub mod reporter;
pub mod scheduler;

pub use aggregator::{LatencyQuantiles, StatsAggregator};
pub use error::{Error, PreflightError};
pub use executor::RequestExecutor;
pub use load_test::LoadTest;
pub use metric_sampler::MetricSampler;
pub use reporter::{HealthStatus, LatencyBand, RateBand, Report, Reporter};
pub use scheduler::{RateScheduler, ScheduleSummary};

pub mod prelude {
    pub use crate::{LoadTest, Report};
    pub use loadgen_core::{Outcome, RunConfig, RunStats};
}
