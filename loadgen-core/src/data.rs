use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One synthetic measurement, serialized as the body of a single ingestion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub device_id: String,
    pub cpu: f64,
    pub rps: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailure {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Timeout => write!(f, "timeout"),
            TransportFailure::Connect => write!(f, "connect"),
            TransportFailure::Other => write!(f, "transport"),
        }
    }
}

/// Classified result of one dispatched request.
///
/// Only `Success` carries a latency that counts towards the run's latency figures. A
/// `Failed` request never got a response and reports a latency of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Success { status: u16, latency: Duration },
    Rejected { status: u16, latency: Duration },
    Failed(TransportFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn latency(&self) -> Duration {
        match self {
            Outcome::Success { latency, .. } | Outcome::Rejected { latency, .. } => *latency,
            Outcome::Failed(_) => Duration::ZERO,
        }
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency().as_secs_f64() * 1e3
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success { status, .. } | Outcome::Rejected { status, .. } => Some(*status),
            Outcome::Failed(_) => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { status, latency } => write!(f, "{status} in {latency:?}"),
            Outcome::Rejected { status, latency } => {
                write!(f, "rejected with {status} in {latency:?}")
            }
            Outcome::Failed(kind) => write!(f, "{kind} failure"),
        }
    }
}
