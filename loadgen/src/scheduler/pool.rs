use async_channel::{bounded, Receiver, Sender};
use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::task::{JoinError, JoinHandle};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Fixed set of workers pulling tickets off a bounded queue.
///
/// Each ticket runs the work closure once. The queue bound is the only backpressure on
/// the admission side; admission never waits on a request itself.
pub(crate) struct WorkerPool {
    queue: Sender<u64>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
}

#[derive(Default)]
struct PoolCounters {
    halted: AtomicBool,
    completed: AtomicU64,
    abandoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolSummary {
    pub completed: u64,
    pub abandoned: u64,
}

impl WorkerPool {
    pub fn spawn<T, F>(size: usize, capacity: usize, work: T) -> Self
    where
        T: Fn() -> F + Send + Sync + 'static + Clone,
        F: Future<Output = ()> + Send + 'static,
    {
        let (queue, tickets) = bounded(capacity.max(1));
        let counters = Arc::new(PoolCounters::default());

        let workers = (0..size)
            .map(|id| {
                let work = work.clone();
                let tickets = tickets.clone();
                let counters = counters.clone();
                tokio::spawn(worker(id, tickets, work, counters).in_current_span())
            })
            .collect();

        Self {
            queue,
            workers,
            counters,
        }
    }

    /// Queue one unit of work. Waits only while the queue is full. Returns `false` once
    /// every worker is gone.
    pub async fn submit(&self, ticket: u64) -> bool {
        self.queue.send(ticket).await.is_ok()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Stop starting new work. Anything still queued is counted as abandoned.
    pub fn halt(&self) {
        self.counters.halted.store(true, Ordering::SeqCst);
    }

    /// Close the queue and wait for every worker to finish what it holds.
    pub async fn drain(self) -> Result<PoolSummary, JoinError> {
        self.queue.close();
        for handle in self.workers {
            handle.await?;
        }

        Ok(PoolSummary {
            completed: self.counters.completed.load(Ordering::SeqCst),
            abandoned: self.counters.abandoned.load(Ordering::SeqCst),
        })
    }
}

async fn worker<T, F>(id: usize, tickets: Receiver<u64>, work: T, counters: Arc<PoolCounters>)
where
    T: Fn() -> F,
    F: Future<Output = ()>,
{
    while let Ok(ticket) = tickets.recv().await {
        if counters.halted.load(Ordering::SeqCst) {
            counters.abandoned.fetch_add(1, Ordering::SeqCst);
            continue;
        }

        trace!(worker = id, ticket, "Starting work");
        work().await;
        counters.completed.fetch_add(1, Ordering::SeqCst);
    }
    trace!(worker = id, "Queue closed; worker exiting");
}
