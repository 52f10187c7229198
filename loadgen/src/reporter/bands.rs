use std::fmt;

/// Throughput and reliability grade, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RateBand {
    Excellent,
    Good,
    Satisfactory,
    Poor,
}

/// `(share of target rate, minimum success percentage, band)`, checked in order.
const RATE_BANDS: [(f64, f64, RateBand); 3] = [
    (0.9, 99., RateBand::Excellent),
    (0.7, 95., RateBand::Good),
    (0.5, 90., RateBand::Satisfactory),
];

impl RateBand {
    pub fn classify(achieved_rate: f64, target_rate: f64, success_rate: f64) -> Self {
        RATE_BANDS
            .iter()
            .find(|(share, min_success, _)| {
                achieved_rate >= target_rate * share && success_rate >= *min_success
            })
            .map(|(_, _, band)| *band)
            .unwrap_or(RateBand::Poor)
    }
}

impl fmt::Display for RateBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RateBand::Excellent => "EXCELLENT: the service kept up with the load",
            RateBand::Good => "GOOD: the service is stable under load",
            RateBand::Satisfactory => "SATISFACTORY: throughput or reliability is degraded",
            RateBand::Poor => "POOR: the service cannot sustain the load",
        };
        f.write_str(label)
    }
}

/// Average latency grade, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LatencyBand {
    Excellent,
    Good,
    Acceptable,
    High,
    /// No request succeeded, so there is no latency to grade.
    NoData,
}

impl LatencyBand {
    pub fn classify(average_latency_ms: f64, successful: u64) -> Self {
        match average_latency_ms {
            _ if successful == 0 => LatencyBand::NoData,
            ms if ms < 50. => LatencyBand::Excellent,
            ms if ms < 100. => LatencyBand::Good,
            ms if ms < 200. => LatencyBand::Acceptable,
            _ => LatencyBand::High,
        }
    }
}

impl fmt::Display for LatencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LatencyBand::Excellent => "excellent latency (< 50 ms)",
            LatencyBand::Good => "good latency (< 100 ms)",
            LatencyBand::Acceptable => "acceptable latency (< 200 ms)",
            LatencyBand::High => "high latency (>= 200 ms)",
            LatencyBand::NoData => "no latency data (no successful requests)",
        };
        f.write_str(label)
    }
}
