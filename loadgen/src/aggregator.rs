//! Shared run statistics
use loadgen_core::{Outcome, RunStats};
use pdatastructs::tdigest::{TDigest, K1};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Thread-safe accumulator for every [`Outcome`] of a run.
///
/// All counters and the latency digest sit behind one mutex so each `record` lands as a
/// single unit: a snapshot never sees `total` bumped without the matching success or
/// failure counter.
pub struct StatsAggregator {
    inner: Mutex<Inner>,
}

struct Inner {
    stats: RunStats,
    latency: TDigest<K1>,
}

/// Latency quantiles over successful requests. `None` until a success is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyQuantiles {
    pub p50: Option<Duration>,
    pub p90: Option<Duration>,
    pub p99: Option<Duration>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                stats: RunStats::default(),
                latency: default_tdigest(),
            }),
        }
    }

    pub fn record(&self, outcome: &Outcome) {
        {
            let mut inner = self.lock();
            inner.stats.apply(outcome);
            if outcome.is_success() {
                inner.latency.insert(outcome.latency().as_secs_f64());
            }
        }

        #[cfg(feature = "metrics")]
        emit_metrics(outcome);
    }

    pub fn snapshot(&self) -> RunStats {
        self.lock().stats
    }

    pub fn latency_quantiles(&self) -> LatencyQuantiles {
        let inner = self.lock();
        if inner.stats.successful == 0 {
            return LatencyQuantiles::default();
        }

        let quantile = |q: f64| {
            let secs = inner.latency.quantile(q);
            // TDigest can hand back NaN on tiny inputs.
            if secs.is_finite() && secs >= 0. {
                Some(Duration::from_secs_f64(secs))
            } else {
                error!("Non-finite latency quantile for q={q}; omitting it.");
                None
            }
        };

        LatencyQuantiles {
            p50: quantile(0.5),
            p90: quantile(0.9),
            p99: quantile(0.99),
        }
    }

    pub fn mark_started(&self, at: Instant) {
        self.lock().stats.started = Some(at);
    }

    pub fn mark_finished(&self, at: Instant) {
        self.lock().stats.finished = Some(at);
    }

    // A panic elsewhere while holding the lock cannot leave a half-applied record, since
    // `RunStats::apply` does not panic; the data is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(feature = "metrics")]
fn emit_metrics(outcome: &Outcome) {
    if outcome.is_success() {
        metrics::counter!("loadgen_requests_success").increment(1);
        metrics::histogram!("loadgen_request_latency").record(outcome.latency().as_secs_f64());
    } else {
        metrics::counter!("loadgen_requests_error").increment(1);
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}
