//! Prometheus recorder installation and series descriptions.

use crate::error::{ProcessorError, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder and return the handle `/metrics` renders.
///
/// Only one recorder can be installed per process; a second call fails.
pub fn install() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ProcessorError::Metrics {
            message: format!("failed to install Prometheus recorder: {}", e),
        })?;

    describe();
    Ok(handle)
}

fn describe() {
    describe_gauge!(
        "processor_components_running",
        "Number of component tasks currently running"
    );
    describe_counter!(
        "processor_component_failures_total",
        "Components that returned an error or panicked"
    );
    describe_counter!(
        "processor_stop_timeouts_total",
        "Component stop calls that exceeded the shutdown budget"
    );
    describe_histogram!(
        "processor_shutdown_duration_seconds",
        Unit::Seconds,
        "Time from the shutdown trigger until every component was settled"
    );
    describe_counter!(
        "processor_subscriber_heartbeats_total",
        "Idle heartbeats emitted by the subscriber"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_once() {
        let handle = install().unwrap();
        metrics::counter!("processor_component_failures_total", "component" => "test").increment(1);

        let rendered = handle.render();
        assert!(rendered.contains("processor_component_failures_total{component=\"test\"} 1"));

        assert!(matches!(install(), Err(ProcessorError::Metrics { .. })));
    }
}
