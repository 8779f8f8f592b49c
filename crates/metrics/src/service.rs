use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::instrument;

use faas_models::{FaasError, OutcomeTag};

/// Prometheus metrics for the execution core: invocation counts by outcome,
/// a duration histogram, live concurrency, and policy denials. Registered
/// once per process and shared behind an `Arc`.
pub struct MetricsService {
    registry: Registry,
    invocations_total: IntCounterVec,
    duration_ms: Histogram,
    concurrent_invocations: Gauge,
    policy_denials_total: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, FaasError> {
        let registry = Registry::new();
        let to_internal = |e: prometheus::Error| FaasError::InternalError { reason: e.to_string() };

        let invocations_total = IntCounterVec::new(
            Opts::new("faas_invocations_total", "Total number of invocations by outcome"),
            &["outcome"],
        )
        .map_err(to_internal)?;

        let duration_ms = Histogram::with_opts(HistogramOpts::new(
            "faas_invocation_duration_ms",
            "Invocation wall-clock duration in milliseconds",
        ))
        .map_err(to_internal)?;

        let concurrent_invocations = Gauge::new(
            "faas_concurrent_invocations",
            "Number of invocations currently executing",
        )
        .map_err(to_internal)?;

        let policy_denials_total = IntCounterVec::new(
            Opts::new("faas_policy_denials_total", "Total number of policy denials by kind"),
            &["kind"],
        )
        .map_err(to_internal)?;

        registry.register(Box::new(invocations_total.clone())).map_err(to_internal)?;
        registry.register(Box::new(duration_ms.clone())).map_err(to_internal)?;
        registry.register(Box::new(concurrent_invocations.clone())).map_err(to_internal)?;
        registry.register(Box::new(policy_denials_total.clone())).map_err(to_internal)?;

        Ok(Self {
            registry,
            invocations_total,
            duration_ms,
            concurrent_invocations,
            policy_denials_total,
        })
    }

    #[instrument(skip(self))]
    pub fn record_invocation(&self, outcome: OutcomeTag, duration_ms: f64) {
        self.invocations_total.with_label_values(&[outcome.as_str()]).inc();
        self.duration_ms.observe(duration_ms);
    }

    pub fn invocation_started(&self) -> InFlightGuard<'_> {
        self.concurrent_invocations.inc();
        InFlightGuard { gauge: &self.concurrent_invocations }
    }

    #[instrument(skip(self))]
    pub fn record_policy_denial(&self, kind: &str) {
        self.policy_denials_total.with_label_values(&[kind]).inc();
    }

    pub fn render(&self) -> Result<String, FaasError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| FaasError::InternalError { reason: e.to_string() })?;
        String::from_utf8(buffer).map_err(|e| FaasError::InternalError { reason: e.to_string() })
    }
}

/// Decrements `concurrent_invocations` on drop, so it falls back whether
/// the invocation finished, timed out, or its future was cancelled.
pub struct InFlightGuard<'a> {
    gauge: &'a Gauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_invocation_by_outcome() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_invocation(OutcomeTag::Success, 12.5);
        metrics.record_invocation(OutcomeTag::Timeout, 5000.0);
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains(r#"faas_invocations_total{outcome="success"} 1"#));
        assert!(rendered.contains(r#"faas_invocations_total{outcome="timeout"} 1"#));
    }

    #[test]
    fn in_flight_guard_tracks_concurrency() {
        let metrics = MetricsService::new().unwrap();
        {
            let _guard = metrics.invocation_started();
            assert!(metrics.render().unwrap().contains("faas_concurrent_invocations 1"));
        }
        assert!(metrics.render().unwrap().contains("faas_concurrent_invocations 0"));
    }

    #[test]
    fn records_policy_denials_by_kind() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_policy_denial("network_denied");
        let rendered = metrics.render().unwrap();
        assert!(rendered.contains(r#"faas_policy_denials_total{kind="network_denied"} 1"#));
    }
}
