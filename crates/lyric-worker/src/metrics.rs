//! Prometheus metrics for the render engine.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "lyric_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "lyric_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "lyric_jobs_failed_total";
    pub const RENDER_DURATION_SECONDS: &str = "lyric_render_duration_seconds";
    pub const JOBS_IN_FLIGHT: &str = "lyric_jobs_in_flight";
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(kind: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
}

/// Tracks a running render; the gauge drops again when this is dropped.
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn start() -> Self {
        gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
        Self(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job_submitted();
        record_job_completed(1.5);
        record_job_failed("encoding_error");
        drop(InFlightGuard::start());
    }
}
