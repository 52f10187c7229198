use crate::{
    DEFAULT_ACCEPTED_STATUS, DEFAULT_DEVICE_COUNT, DEFAULT_DURATION, DEFAULT_POOL_SIZE,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_PROGRESS_EVERY, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TARGET_RATE,
    QUEUE_DEPTH_SECS,
};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid base url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Target rate must be a positive, finite number of requests per second (got {0})")]
    InvalidRate(f64),

    #[error("Run duration must be greater than zero")]
    ZeroDuration,

    #[error("Worker pool needs at least one worker")]
    EmptyPool,

    #[error("Device pool needs at least one device id")]
    NoDevices,

    #[error("Request and probe timeouts must be greater than zero")]
    ZeroTimeout,

    #[error("At least one accepted status code is required")]
    NoAcceptedStatus,

    #[error("Work queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Parameters of a single load run.
///
/// Built once with the consuming setters below and checked with [`RunConfig::validate`]
/// before anything is dispatched. Nothing here changes while a run is in progress.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub base_url: Url,
    pub duration: Duration,
    pub rate: f64,
    pub pool_size: usize,
    pub devices: Vec<String>,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub accepted_status: Vec<u16>,
    pub progress_every: u64,
    pub queue_capacity: Option<usize>,
}

impl RunConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url).map_err(|err| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: parsed,
            duration: DEFAULT_DURATION,
            rate: DEFAULT_TARGET_RATE,
            pool_size: DEFAULT_POOL_SIZE,
            devices: device_pool(DEFAULT_DEVICE_COUNT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            accepted_status: DEFAULT_ACCEPTED_STATUS.to_vec(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            queue_capacity: None,
        })
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Replace the device pool with `count` ids of the form `device_001`.
    pub fn devices(mut self, count: usize) -> Self {
        self.devices = device_pool(count);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn accepted_status(mut self, codes: &[u16]) -> Self {
        self.accepted_status = codes.to_vec();
        self
    }

    pub fn progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate.is_finite() || self.rate <= 0. {
            return Err(ConfigError::InvalidRate(self.rate));
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if self.request_timeout.is_zero() || self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.accepted_status.is_empty() {
            return Err(ConfigError::NoAcceptedStatus);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    /// Gap between two scheduled submissions. Only meaningful on a validated config.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1. / self.rate)
    }

    /// Number of submissions a perfect schedule would produce over the whole run.
    pub fn target_requests(&self) -> u64 {
        (self.rate * self.duration.as_secs_f64()).round() as u64
    }

    pub fn resolved_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or_else(|| {
            let per_second = self.rate.ceil() as usize;
            per_second.max(self.pool_size).max(1) * QUEUE_DEPTH_SECS
        })
    }

    pub fn is_accepted(&self, status: u16) -> bool {
        self.accepted_status.contains(&status)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

pub fn device_pool(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("device_{i:03}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ANOMALIES_PATH, METRICS_PATH};

    fn config() -> RunConfig {
        RunConfig::new("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = config();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.devices.len(), 20);
        assert_eq!(config.devices[0], "device_001");
        assert_eq!(config.devices[19], "device_020");
        assert_eq!(config.target_requests(), 300_000);
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert_eq!(
            config().rate(0.).validate(),
            Err(ConfigError::InvalidRate(0.))
        );
        assert_eq!(
            config().rate(-3.).validate(),
            Err(ConfigError::InvalidRate(-3.))
        );
        assert!(matches!(
            config().rate(f64::NAN).validate(),
            Err(ConfigError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_rejects_empty_resources() {
        assert_eq!(
            config().duration(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration)
        );
        assert_eq!(config().pool_size(0).validate(), Err(ConfigError::EmptyPool));
        assert_eq!(config().devices(0).validate(), Err(ConfigError::NoDevices));
        assert_eq!(
            config().accepted_status(&[]).validate(),
            Err(ConfigError::NoAcceptedStatus)
        );
        assert_eq!(
            config().queue_capacity(0).validate(),
            Err(ConfigError::ZeroQueueCapacity)
        );
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            RunConfig::new("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            RunConfig::new("ftp://localhost"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = RunConfig::new("http://localhost:8080/").unwrap();
        assert_eq!(
            config.endpoint(METRICS_PATH),
            "http://localhost:8080/api/metrics"
        );

        let config = RunConfig::new("http://localhost:8080/ingest").unwrap();
        assert_eq!(
            config.endpoint(ANOMALIES_PATH),
            "http://localhost:8080/ingest/api/anomalies"
        );
    }

    #[test]
    fn test_period_and_queue_capacity() {
        let config = config().rate(10.).pool_size(4);
        assert_eq!(config.period(), Duration::from_millis(100));
        assert_eq!(config.resolved_queue_capacity(), 50);

        let config = config.pool_size(64);
        assert_eq!(config.resolved_queue_capacity(), 320);

        let config = config.queue_capacity(7);
        assert_eq!(config.resolved_queue_capacity(), 7);
    }
}
