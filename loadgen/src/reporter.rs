//! Pre-flight probe, post-run enrichment and the final summary
mod bands;

pub use bands::{LatencyBand, RateBand};

use crate::aggregator::LatencyQuantiles;
use crate::error::{Error, PreflightError};
use crate::scheduler::ScheduleSummary;
use loadgen_core::{RunConfig, RunStats, ANOMALIES_PATH, HEALTH_PATH};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Body of a successful health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub status: Option<String>,
    pub body: serde_json::Value,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Some(status) => write!(f, "{status} ({})", self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnomalySummary {
    #[serde(default)]
    count: u64,
}

/// Talks to the auxiliary endpoints around a run: `/health` before it, `/api/anomalies`
/// after it.
pub struct Reporter {
    client: reqwest::Client,
    health_url: String,
    anomalies_url: String,
}

impl Reporter {
    pub fn new(config: &RunConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .map_err(Error::Client)?;

        Ok(Self {
            client,
            health_url: config.endpoint(HEALTH_PATH),
            anomalies_url: config.endpoint(ANOMALIES_PATH),
        })
    }

    /// Single GET against `/health`. Anything but a 200 with a JSON body is fatal.
    #[instrument(skip_all, fields(url = %self.health_url))]
    pub async fn preflight(&self) -> Result<HealthStatus, PreflightError> {
        let url = &self.health_url;
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| PreflightError::Unreachable {
                    url: url.clone(),
                    source,
                })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Health probe answered {status}");
            return Err(PreflightError::BadStatus {
                url: url.clone(),
                status,
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|source| PreflightError::InvalidBody {
                    url: url.clone(),
                    source,
                })?;

        let health = HealthStatus {
            status: body
                .get("status")
                .and_then(|s| s.as_str())
                .map(str::to_string),
            body,
        };
        debug!("Health probe passed: {health}");
        Ok(health)
    }

    /// Best effort: any failure is reported as zero anomalies.
    pub async fn anomaly_count(&self) -> u64 {
        match self.fetch_anomaly_count().await {
            Ok(count) => count,
            Err(err) => {
                info!("Anomaly count unavailable, reporting 0: {err}");
                0
            }
        }
    }

    async fn fetch_anomaly_count(&self) -> Result<u64, reqwest::Error> {
        let summary: AnomalySummary = self
            .client
            .get(&self.anomalies_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(summary.count)
    }
}

/// Everything known about a finished (or interrupted) run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub target_rate: f64,
    pub elapsed: Duration,
    pub stats: RunStats,
    pub schedule: ScheduleSummary,
    pub latency: LatencyQuantiles,
    pub average_latency_ms: f64,
    pub achieved_rate: f64,
    pub success_rate: f64,
    pub anomalies: u64,
    pub rate_band: RateBand,
    pub latency_band: LatencyBand,
}

impl Report {
    pub fn new(
        config: &RunConfig,
        stats: RunStats,
        latency: LatencyQuantiles,
        schedule: ScheduleSummary,
        anomalies: u64,
    ) -> Self {
        let average_latency_ms = stats.average_latency_ms();
        let achieved_rate = stats.achieved_rate();
        let success_rate = stats.success_rate();

        Self {
            target_rate: config.rate,
            elapsed: stats.elapsed(),
            stats,
            schedule,
            latency,
            average_latency_ms,
            achieved_rate,
            success_rate,
            anomalies,
            rate_band: RateBand::classify(achieved_rate, config.rate, success_rate),
            latency_band: LatencyBand::classify(average_latency_ms, stats.successful),
        }
    }
}

const RULE: &str =
    "================================================================================";

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |d: Option<Duration>| match d {
            Some(d) => format!("{:.2} ms", d.as_secs_f64() * 1e3),
            None => "n/a".to_string(),
        };
        let stats = &self.stats;

        writeln!(f, "{RULE}")?;
        if self.schedule.aborted {
            writeln!(f, "LOAD TEST RESULTS (aborted, in-flight requests dropped)")?;
        } else if self.schedule.interrupted {
            writeln!(f, "LOAD TEST RESULTS (interrupted, partial)")?;
        } else {
            writeln!(f, "LOAD TEST RESULTS")?;
        }
        writeln!(f, "{RULE}")?;
        writeln!(f, "Elapsed:             {:.2} s", self.elapsed.as_secs_f64())?;
        if !self.schedule.aborted {
            writeln!(f, "Submitted:           {}", self.schedule.submitted)?;
        }
        writeln!(f, "Total requests:      {}", stats.total)?;
        writeln!(f, "Successful:          {}", stats.successful)?;
        writeln!(
            f,
            "Failed:              {} (rejected {}, timeouts {}, transport {})",
            stats.failed, stats.rejected, stats.timeouts, stats.transport_errors
        )?;
        if self.schedule.abandoned > 0 {
            writeln!(f, "Abandoned:           {}", self.schedule.abandoned)?;
        }
        if self.schedule.skipped_ticks > 0 {
            writeln!(f, "Skipped slots:       {}", self.schedule.skipped_ticks)?;
        }
        writeln!(f, "Success rate:        {:.2}%", self.success_rate)?;
        writeln!(
            f,
            "Achieved rate:       {:.2}/s (target {:.2}/s)",
            self.achieved_rate, self.target_rate
        )?;
        writeln!(f)?;
        writeln!(f, "Latency:")?;
        writeln!(f, "  Average:           {:.2} ms", self.average_latency_ms)?;
        match stats.min_latency() {
            Some(min) => writeln!(f, "  Min:               {min:.2} ms")?,
            None => writeln!(f, "  Min:               n/a")?,
        }
        writeln!(f, "  Max:               {:.2} ms", stats.max_latency_ms)?;
        writeln!(f, "  p50:               {}", ms(self.latency.p50))?;
        writeln!(f, "  p90:               {}", ms(self.latency.p90))?;
        writeln!(f, "  p99:               {}", ms(self.latency.p99))?;
        writeln!(f)?;
        writeln!(f, "Anomalies detected:  {}", self.anomalies)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Verdict:")?;
        writeln!(f, "  {}", self.rate_band)?;
        writeln!(f, "  {}", self.latency_band)?;
        write!(f, "{RULE}")
    }
}
