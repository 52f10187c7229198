use loadgen_core::Sample;
use rand::seq::SliceRandom;
use rand::Rng;
use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

/// Share of samples that carry an anomalous CPU reading.
pub const DEFAULT_ANOMALY_RATE: f64 = 0.05;

const NORMAL_CPU: Range<f64> = 20.0..70.0;
const ANOMALOUS_CPU: Range<f64> = 85.0..99.0;
const RPS: Range<f64> = 100.0..500.0;
const MEMORY: Range<f64> = 40.0..80.0;

/// Generates the synthetic payloads sent as load.
#[derive(Debug, Clone)]
pub struct MetricSampler {
    devices: Vec<String>,
    anomaly_rate: f64,
}

impl MetricSampler {
    pub fn new(devices: Vec<String>) -> Self {
        Self {
            devices,
            anomaly_rate: DEFAULT_ANOMALY_RATE,
        }
    }

    pub fn anomaly_rate(mut self, rate: f64) -> Self {
        self.anomaly_rate = rate.clamp(0., 1.);
        self
    }

    pub fn sample(&self) -> Sample {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Sample {
        let device_id = self.devices.choose(rng).cloned().unwrap_or_default();
        let cpu = if rng.gen_bool(self.anomaly_rate) {
            rng.gen_range(ANOMALOUS_CPU)
        } else {
            rng.gen_range(NORMAL_CPU)
        };

        Sample {
            timestamp: unix_now(),
            device_id,
            cpu,
            rps: rng.gen_range(RPS),
            memory: rng.gen_range(MEMORY),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
