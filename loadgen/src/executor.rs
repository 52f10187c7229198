use crate::aggregator::StatsAggregator;
use crate::error::Error;
use crate::metric_sampler::MetricSampler;
use loadgen_core::{Outcome, RunConfig, Sample, TransportFailure, METRICS_PATH};
use std::sync::Arc;
use std::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Sends one sample per call and records what happened.
///
/// Cheap to clone: the HTTP client, sampler and aggregator are shared between clones, so
/// every worker reuses the same connection pool.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    endpoint: Arc<str>,
    accepted_status: Arc<[u16]>,
    sampler: Arc<MetricSampler>,
    stats: Arc<StatsAggregator>,
}

impl RequestExecutor {
    pub fn new(config: &RunConfig, stats: Arc<StatsAggregator>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.pool_size)
            .build()
            .map_err(Error::Client)?;

        Ok(Self::with_client(client, config, stats))
    }

    pub fn with_client(
        client: reqwest::Client,
        config: &RunConfig,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            client,
            endpoint: config.endpoint(METRICS_PATH).into(),
            accepted_status: config.accepted_status.clone().into(),
            sampler: Arc::new(MetricSampler::new(config.devices.clone())),
            stats,
        }
    }

    /// Generate a fresh sample and send it.
    pub async fn dispatch(&self) -> Outcome {
        let sample = self.sampler.sample();
        self.execute(&sample).await
    }

    /// Send `sample` and record the outcome exactly once, whatever happens.
    pub async fn execute(&self, sample: &Sample) -> Outcome {
        let outcome = self.send(sample).await;
        trace!(device = %sample.device_id, "{outcome}");
        self.stats.record(&outcome);
        outcome
    }

    async fn send(&self, sample: &Sample) -> Outcome {
        let start = Instant::now();

        let response = match self.client.post(&*self.endpoint).json(sample).send().await {
            Ok(response) => response,
            Err(err) => return Outcome::Failed(classify(&err)),
        };
        let latency = start.elapsed();
        let status = response.status().as_u16();

        // Drain the body so the connection goes back to the pool.
        if let Err(err) = response.bytes().await {
            return Outcome::Failed(classify(&err));
        }

        if self.accepted_status.contains(&status) {
            Outcome::Success { status, latency }
        } else {
            Outcome::Rejected { status, latency }
        }
    }
}

fn classify(err: &reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Connect
    } else {
        TransportFailure::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    fn unused_port() -> u16 {
        // Bind then drop so nothing is listening on the port afterwards.
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn test_connection_refused_is_recorded_once() {
        let config = RunConfig::new(&format!("http://127.0.0.1:{}", unused_port()))
            .unwrap()
            .request_timeout(Duration::from_secs(1));
        let stats = Arc::new(StatsAggregator::new());
        let executor = RequestExecutor::new(&config, stats.clone()).unwrap();

        let outcome = executor.dispatch().await;
        assert!(matches!(
            outcome,
            Outcome::Failed(TransportFailure::Connect | TransportFailure::Other)
        ));
        assert_eq!(outcome.latency_ms(), 0.);
        assert_eq!(outcome.status(), None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.successful, 0);
        assert!(snapshot.min_latency_ms.is_infinite());
    }
}
