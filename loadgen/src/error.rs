use loadgen_core::ConfigError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that stop a run. Per-request failures never surface here; they are recorded as
/// outcomes instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Pre-flight check failed: {0}")]
    Preflight(#[from] PreflightError),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("service unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("service at {url} answered {status}")]
    BadStatus { url: String, status: StatusCode },

    #[error("service at {url} sent an unparseable health body: {source}")]
    InvalidBody {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl PreflightError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PreflightError::Unreachable { source, .. } if source.is_timeout())
    }
}
