mod utils;
#[allow(unused)]
use utils::*;

use loadgen::prelude::*;
use loadgen::{Error, PreflightError, RateBand};
use mock_service::{HealthMode, MockConfig};
use std::time::Duration;

fn config(base_url: &str, rate: f64, duration: Duration) -> RunConfig {
    RunConfig::new(base_url)
        .unwrap()
        .rate(rate)
        .duration(duration)
        .pool_size(4)
        .devices(5)
        .request_timeout(Duration::from_secs(2))
        .probe_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn steady_rate_against_healthy_service() {
    let mock = init(MockConfig::default().latency(Duration::from_millis(50))).await;

    let test = LoadTest::new(config(&mock.base_url(), 10., Duration::from_secs(2))).unwrap();
    let report = test.run().await.unwrap();

    assert!(!report.schedule.interrupted);
    assert!(
        (18..=20).contains(&report.schedule.submitted),
        "{:?}",
        report.schedule
    );
    assert_eq!(report.stats.total, report.schedule.submitted);
    assert_eq!(report.stats.successful, report.stats.total);
    assert_eq!(report.stats.failed, 0);
    assert_eq!(mock.state.accepted(), report.stats.total);
    assert_eq!(mock.state.health_checks(), 1);

    assert!(dbg!(report.average_latency_ms) >= 50.);
    assert!(report.average_latency_ms < 500.);
    assert!(report.stats.min_latency().unwrap() >= 50.);
    assert!(report.latency.p50.is_some());
    assert_eq!(report.rate_band, RateBand::Excellent, "{report}");
    assert!(report.anomalies <= report.stats.total);
}

#[tokio::test]
async fn rejections_count_as_failures_without_latency() {
    let mock = init(
        MockConfig::default()
            .latency(Duration::from_millis(80))
            .reject_every(2, 500),
    )
    .await;

    let test = LoadTest::new(config(&mock.base_url(), 20., Duration::from_secs(1))).unwrap();
    let report = test.run().await.unwrap();
    let stats = report.stats;

    assert!(stats.total > 0);
    assert_eq!(stats.total, stats.successful + stats.failed);
    assert_eq!(stats.failed, stats.rejected);
    assert!(stats.successful.abs_diff(stats.rejected) <= 1, "{stats:?}");
    assert_eq!(mock.state.rejected(), stats.rejected);

    // Rejections answer immediately; only the delayed successes shape latency.
    assert!(stats.min_latency().unwrap() >= 80.);
    assert!(report.success_rate < 60.);
    assert_eq!(report.rate_band, RateBand::Poor);
}

#[tokio::test]
async fn unhealthy_service_aborts_before_any_load() {
    let mock = init(MockConfig::default().health(HealthMode::Status(503))).await;

    let test = LoadTest::new(config(&mock.base_url(), 50., Duration::from_secs(1))).unwrap();
    let err = test.run().await.unwrap_err();

    assert!(
        matches!(
            err,
            Error::Preflight(PreflightError::BadStatus { status, .. }) if status.as_u16() == 503
        ),
        "{err}"
    );
    assert_eq!(mock.state.received(), 0);
    assert_eq!(test.stats().snapshot().total, 0);
}

#[tokio::test]
async fn slow_health_probe_times_out() {
    let mock = init(MockConfig::default().health(HealthMode::Delay(Duration::from_secs(3)))).await;

    let config = config(&mock.base_url(), 50., Duration::from_secs(1))
        .probe_timeout(Duration::from_millis(300));
    let err = LoadTest::new(config).unwrap().run().await.unwrap_err();

    match err {
        Error::Preflight(err) => assert!(err.is_timeout(), "{err}"),
        err => panic!("unexpected error: {err}"),
    }
    assert_eq!(mock.state.received(), 0);
}

#[tokio::test]
async fn unparseable_health_body_is_fatal() {
    let mock = init(MockConfig::default().health(HealthMode::Garbage)).await;

    let test = LoadTest::new(config(&mock.base_url(), 50., Duration::from_secs(1))).unwrap();
    let err = test.run().await.unwrap_err();

    assert!(
        matches!(err, Error::Preflight(PreflightError::InvalidBody { .. })),
        "{err}"
    );
    assert_eq!(mock.state.received(), 0);
}

#[tokio::test]
async fn missing_anomaly_endpoint_reports_zero() {
    let mock = init(MockConfig::default().anomalies_down()).await;

    let test = LoadTest::new(config(&mock.base_url(), 20., Duration::from_millis(500))).unwrap();
    let report = test.run().await.unwrap();

    assert!(report.stats.total > 0);
    assert_eq!(report.anomalies, 0);
}

#[tokio::test]
async fn interrupt_still_produces_consistent_report() {
    let mock = init(MockConfig::default().latency(Duration::from_millis(20))).await;

    let test = LoadTest::new(config(&mock.base_url(), 20., Duration::from_secs(60))).unwrap();
    let report = test
        .run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert!(report.schedule.interrupted);
    assert!(report.schedule.submitted > 0);
    assert_eq!(
        report.schedule.submitted,
        report.schedule.completed + report.schedule.abandoned
    );
    assert_eq!(report.stats.total, report.schedule.completed);
    assert_eq!(
        report.stats.total,
        report.stats.successful + report.stats.failed
    );
    assert!(report.elapsed < Duration::from_secs(5));
    assert!(report.to_string().contains("interrupted"));
}

#[tokio::test]
async fn rate_capped_service_answers_too_many_requests() {
    let mock = init(MockConfig::default().max_tps(5)).await;

    let test = LoadTest::new(config(&mock.base_url(), 40., Duration::from_secs(1))).unwrap();
    let report = test.run().await.unwrap();

    assert!(report.stats.rejected > 0, "{:?}", report.stats);
    assert!(report.stats.successful > 0);
    assert_eq!(mock.state.rejected(), report.stats.rejected);
}

#[tokio::test]
async fn unaccepted_status_is_a_rejection() {
    let mock = init(MockConfig::default()).await;

    // The mock answers 202, which this run does not accept.
    let config = config(&mock.base_url(), 10., Duration::from_millis(500)).accepted_status(&[200]);
    let report = LoadTest::new(config).unwrap().run().await.unwrap();

    assert!(report.stats.total > 0);
    assert_eq!(report.stats.successful, 0);
    assert_eq!(report.stats.rejected, report.stats.total);
    assert_eq!(report.latency_band, loadgen::LatencyBand::NoData);
}

#[tokio::test]
async fn second_interrupt_abandons_in_flight_requests() {
    let mock = init(MockConfig::default().latency(Duration::from_secs(3))).await;

    let test = LoadTest::new(config(&mock.base_url(), 20., Duration::from_secs(60))).unwrap();
    let started = std::time::Instant::now();
    let report = test
        .run_until_or_abort(
            tokio::time::sleep(Duration::from_millis(300)),
            tokio::time::sleep(Duration::from_millis(800)),
        )
        .await
        .unwrap();

    // Every admitted request is still waiting on the slow service when the drain is abandoned.
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    assert!(report.schedule.aborted);
    assert!(report.schedule.interrupted);
    assert_eq!(report.stats.total, 0);
    assert!(mock.state.received() > 0);
    assert!(report.to_string().contains("aborted"));
}
