//! Rate-controlled dispatch
mod pool;
mod ticker;

use crate::aggregator::StatsAggregator;
use loadgen_core::{ConfigError, RunConfig};
use pool::WorkerPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use ticker::Ticker;
use tokio::task::JoinError;
use tokio::time::{sleep_until, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// What the admission loop did during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleSummary {
    /// Units handed to the worker pool.
    pub submitted: u64,
    /// Units that ran to completion.
    pub completed: u64,
    /// Units dropped from the queue by an interrupt before any worker started them.
    pub abandoned: u64,
    /// Schedule slots skipped because admission fell too far behind.
    pub skipped_ticks: u64,
    pub interrupted: bool,
    /// The run was cut short before in-flight work drained; the counts above are not known.
    pub aborted: bool,
}

/// Drives work into a bounded worker pool at a fixed target rate.
///
/// The schedule is a fixed-interval cursor starting at the beginning of the run. Admission
/// stops for good once the configured duration has elapsed, and `run` only returns after
/// every admitted unit has finished.
pub struct RateScheduler {
    period: Duration,
    duration: Duration,
    pool_size: usize,
    queue_capacity: usize,
    progress_every: u64,
    target_requests: u64,
    stats: Arc<StatsAggregator>,
}

impl RateScheduler {
    pub fn new(config: &RunConfig, stats: Arc<StatsAggregator>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            period: config.period(),
            duration: config.duration,
            pool_size: config.pool_size,
            queue_capacity: config.resolved_queue_capacity(),
            progress_every: config.progress_every,
            target_requests: config.target_requests(),
            stats,
        })
    }

    pub async fn run<T, F>(&self, work: T) -> Result<ScheduleSummary, JoinError>
    where
        T: Fn() -> F + Send + Sync + 'static + Clone,
        F: Future<Output = ()> + Send + 'static,
    {
        self.run_until(work, std::future::pending()).await
    }

    /// Like [`RateScheduler::run`], but stops admitting as soon as `shutdown` resolves.
    /// Queued work that no worker has started yet is abandoned; work already running is
    /// allowed to finish.
    #[instrument(name = "scheduler", skip_all, fields(period = ?self.period, workers = self.pool_size))]
    pub async fn run_until<T, F, S>(
        &self,
        work: T,
        shutdown: S,
    ) -> Result<ScheduleSummary, JoinError>
    where
        T: Fn() -> F + Send + Sync + 'static + Clone,
        F: Future<Output = ()> + Send + 'static,
        S: Future<Output = ()>,
    {
        let pool = WorkerPool::spawn(self.pool_size, self.queue_capacity, work);
        tokio::pin!(shutdown);

        let mut ticker = Ticker::new(self.period);
        let deadline = ticker.start() + self.duration;
        self.stats.mark_started(ticker.start());
        info!(
            "Dispatching one request every {ticker} for {}",
            humantime::format_duration(self.duration)
        );

        let mut submitted = 0u64;
        let mut interrupted = false;
        let mut saturated = false;

        // NOTE: This loop must only ever wait on the ticker, the queue bound, the deadline or
        // shutdown. Never on a request.
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                _ = sleep_until(deadline) => break,
                _ = ticker.tick() => {}
            }

            if Instant::now() >= deadline {
                break;
            }

            if pool.is_full() && !saturated {
                saturated = true;
                warn!(
                    "Work queue is full ({} queued); admission is now paced by the worker pool.",
                    pool.queued()
                );
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                _ = sleep_until(deadline) => break,
                accepted = pool.submit(submitted) => {
                    if !accepted {
                        error!("Worker pool closed unexpectedly; stopping admission.");
                        break;
                    }
                }
            }
            submitted += 1;

            if self.progress_every > 0 && submitted % self.progress_every == 0 {
                self.log_progress(submitted);
            }
        }

        if interrupted {
            info!("Interrupted after {submitted} submissions; abandoning queued work.");
            pool.halt();
        } else {
            info!("Admission closed after {submitted} submissions; waiting for in-flight work.");
        }

        let drained = pool.drain().await?;
        self.stats.mark_finished(Instant::now());

        let summary = ScheduleSummary {
            submitted,
            completed: drained.completed,
            abandoned: drained.abandoned,
            skipped_ticks: ticker.skipped(),
            interrupted,
            aborted: false,
        };
        if summary.skipped_ticks > 0 {
            warn!(
                "{} schedule slots were skipped because admission lagged the target rate.",
                summary.skipped_ticks
            );
        }
        debug!("Schedule complete: {summary:?}");

        Ok(summary)
    }

    fn log_progress(&self, submitted: u64) {
        let stats = self.stats.snapshot();
        info!(
            "Progress: {submitted}/{} submitted, rate={:.1}/s, succeeded={}, failed={}",
            self.target_requests,
            stats.achieved_rate(),
            stats.successful,
            stats.failed,
        );
    }
}
