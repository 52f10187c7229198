use crate::{Outcome, TransportFailure};
use std::time::Duration;
use tokio::time::Instant;

/// Aggregate of every outcome recorded during a run.
///
/// A plain value: the shared, lock-guarded copy lives in the aggregator and this is what
/// a snapshot hands out. `min_latency_ms` stays at `f64::INFINITY` until the first
/// successful request is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub latency_sum_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub started: Option<Instant>,
    pub finished: Option<Instant>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            rejected: 0,
            timeouts: 0,
            transport_errors: 0,
            latency_sum_ms: 0.,
            min_latency_ms: f64::INFINITY,
            max_latency_ms: 0.,
            started: None,
            finished: None,
        }
    }
}

impl RunStats {
    /// Fold a single outcome into the counters. Callers sharing a `RunStats` must hold
    /// their lock across the whole call.
    pub fn apply(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Success { .. } => {
                let latency = outcome.latency_ms();
                self.successful += 1;
                self.latency_sum_ms += latency;
                self.min_latency_ms = self.min_latency_ms.min(latency);
                self.max_latency_ms = self.max_latency_ms.max(latency);
            }
            Outcome::Rejected { .. } => {
                self.failed += 1;
                self.rejected += 1;
            }
            Outcome::Failed(TransportFailure::Timeout) => {
                self.failed += 1;
                self.timeouts += 1;
            }
            Outcome::Failed(_) => {
                self.failed += 1;
                self.transport_errors += 1;
            }
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.successful == 0 {
            0.
        } else {
            self.latency_sum_ms / self.successful as f64
        }
    }

    /// `None` while no successful request has been seen.
    pub fn min_latency(&self) -> Option<f64> {
        (self.successful > 0).then_some(self.min_latency_ms)
    }

    /// Percentage of recorded requests that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.successful as f64 / self.total as f64 * 100.
        }
    }

    /// Wall time from start to finish, or to now for a run still in progress.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.finished) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Recorded requests per second over [`RunStats::elapsed`].
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0. {
            self.total as f64 / secs
        } else {
            0.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ms: u64) -> Outcome {
        Outcome::Success {
            status: 202,
            latency: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_empty_stats() {
        let stats = RunStats::default();
        assert_eq!(stats.average_latency_ms(), 0.);
        assert_eq!(stats.success_rate(), 0.);
        assert_eq!(stats.min_latency(), None);
        assert!(stats.min_latency_ms.is_infinite());
        assert_eq!(stats.max_latency_ms, 0.);
        assert_eq!(stats.elapsed(), Duration::ZERO);
        assert_eq!(stats.achieved_rate(), 0.);
    }

    #[test]
    fn test_only_successes_move_latency() {
        let mut stats = RunStats::default();
        stats.apply(&success(40));
        stats.apply(&Outcome::Rejected {
            status: 500,
            latency: Duration::from_millis(1),
        });
        stats.apply(&Outcome::Failed(TransportFailure::Timeout));
        stats.apply(&Outcome::Failed(TransportFailure::Connect));
        stats.apply(&success(60));

        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.transport_errors, 1);
        assert_eq!(stats.min_latency(), Some(40.));
        assert_eq!(stats.max_latency_ms, 60.);
        assert!((stats.average_latency_ms() - 50.).abs() < 1e-9);
        assert!((stats.success_rate() - 40.).abs() < 1e-9);
    }

    #[test]
    fn test_failures_leave_min_at_sentinel() {
        let mut stats = RunStats::default();
        for _ in 0..10 {
            stats.apply(&Outcome::Failed(TransportFailure::Other));
        }
        assert_eq!(stats.total, stats.failed);
        assert!(stats.min_latency_ms.is_infinite());
        assert_eq!(stats.average_latency_ms(), 0.);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_and_rate() {
        let mut stats = RunStats {
            started: Some(Instant::now()),
            ..Default::default()
        };
        for _ in 0..20 {
            stats.apply(&success(5));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        stats.finished = Some(Instant::now());

        assert_eq!(stats.elapsed(), Duration::from_secs(2));
        assert!((stats.achieved_rate() - 10.).abs() < 1e-9);
    }
}
