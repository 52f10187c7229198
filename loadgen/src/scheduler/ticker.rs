use loadgen_core::TICK_LAG_TOLERANCE;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Fixed-interval schedule cursor.
///
/// Slot `k` is due at `start + k * period`. Each `tick` sleeps until the next slot and
/// hands it out. Slots that are already more than [`TICK_LAG_TOLERANCE`] behind are
/// skipped rather than replayed, so a stalled loop never bursts to catch up.
pub(crate) struct Ticker {
    start: Instant,
    next: Instant,
    period: Duration,
    skipped: u64,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            next: start,
            period: period.max(Duration::from_nanos(1)),
            skipped: 0,
        }
    }

    /// Wait for the next slot and return the instant it was scheduled for.
    pub async fn tick(&mut self) -> Instant {
        if Instant::now() < self.next {
            sleep_until(self.next).await;
        }

        let lag = Instant::now().saturating_duration_since(self.next);
        if lag > TICK_LAG_TOLERANCE {
            let missed = lag.as_nanos() / self.period.as_nanos();
            self.next += Duration::from_nanos((missed * self.period.as_nanos()) as u64);
            self.skipped += missed as u64;
            trace!("Skipped {missed} ticks after lagging {lag:?}");
        }

        let scheduled = self.next;
        self.next += self.period;
        scheduled
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.period))
    }
}
