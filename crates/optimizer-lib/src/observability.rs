//! Observability for optimization runs
//!
//! Provides:
//! - Prometheus metrics (query latency, run outcomes, per-dimension values)
//! - Structured logging of run events with tracing

use crate::error::RunError;
use crate::models::{DesiredPercentage, OptimizationReport, ResourceDefinition, ResourceDimension};
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    Encoder, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for collaborator query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OptimizerMetricsInner> = OnceLock::new();

struct OptimizerMetricsInner {
    query_latency_seconds: HistogramVec,
    runs_total: IntCounterVec,
    current_allocation: GaugeVec,
    utilization_percent: GaugeVec,
    proposed_allocation: GaugeVec,
}

impl OptimizerMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram_vec!(
                "ecs_optimizer_query_latency_seconds",
                "Time spent waiting on definition and utilization queries",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            runs_total: register_int_counter_vec!(
                "ecs_optimizer_runs_total",
                "Optimization runs by outcome",
                &["outcome"]
            )
            .expect("Failed to register runs_total"),

            current_allocation: register_gauge_vec!(
                "ecs_optimizer_current_allocation",
                "Currently configured allocation (CPU units or MiB)",
                &["cluster", "service", "dimension"]
            )
            .expect("Failed to register current_allocation"),

            utilization_percent: register_gauge_vec!(
                "ecs_optimizer_utilization_percent",
                "Average utilization over the trailing window",
                &["cluster", "service", "dimension"]
            )
            .expect("Failed to register utilization_percent"),

            proposed_allocation: register_gauge_vec!(
                "ecs_optimizer_proposed_allocation",
                "Proposed allocation (CPU units or MiB)",
                &["cluster", "service", "dimension"]
            )
            .expect("Failed to register proposed_allocation"),
        }
    }
}

/// Handle to the process-global optimizer metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct OptimizerMetrics {
    _private: (),
}

impl Default for OptimizerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OptimizerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OptimizerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record how long a collaborator query took
    pub fn observe_query_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .query_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn inc_run(&self, outcome: &str) {
        self.inner().runs_total.with_label_values(&[outcome]).inc();
    }

    /// Publish the values of a completed report
    pub fn record_report(&self, report: &OptimizationReport) {
        let inner = self.inner();
        for dimension in report.desired_percentage.dimensions() {
            let labels = [
                report.cluster.as_str(),
                report.service.as_str(),
                dimension.as_str(),
            ];
            inner
                .current_allocation
                .with_label_values(&labels)
                .set(report.current_def.value(dimension) as f64);
            if let Some(utilization) = report.utilization.get(&dimension) {
                inner.utilization_percent.with_label_values(&labels).set(*utilization);
            }
            if let Some(proposed) = report.proposal.get(&dimension) {
                inner
                    .proposed_allocation
                    .with_label_values(&labels)
                    .set(*proposed as f64);
            }
        }
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for run events
///
/// Every event carries the cluster and service it concerns.
#[derive(Clone)]
pub struct StructuredLogger {
    cluster: String,
    service: String,
}

impl StructuredLogger {
    pub fn new(cluster: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            service: service.into(),
        }
    }

    pub fn log_run_started(&self, desired: &DesiredPercentage) {
        info!(
            event = "run_started",
            cluster = %self.cluster,
            service = %self.service,
            cpu_desired_percentage = ?desired.get(ResourceDimension::Cpu),
            memory_desired_percentage = ?desired.get(ResourceDimension::Memory),
            "Optimization run started"
        );
    }

    pub fn log_definition_loaded(&self, definition: &ResourceDefinition) {
        info!(
            event = "definition_loaded",
            cluster = %self.cluster,
            service = %self.service,
            cpu = definition.cpu,
            memory = definition.memory,
            reserved_memory = definition.reserved_memory,
            "Loaded current resource definition"
        );
    }

    pub fn log_utilization(&self, dimension: ResourceDimension, average: f64) {
        info!(
            event = "utilization_collected",
            cluster = %self.cluster,
            service = %self.service,
            dimension = %dimension,
            average_percent = average,
            "Collected utilization average"
        );
    }

    pub fn log_proposal(
        &self,
        dimension: ResourceDimension,
        current: i64,
        utilization: f64,
        desired: f64,
        proposed: u64,
    ) {
        info!(
            event = "proposal_computed",
            cluster = %self.cluster,
            service = %self.service,
            dimension = %dimension,
            current = current,
            utilization_percent = utilization,
            desired_percent = desired,
            proposed = proposed,
            "Computed proposal"
        );
    }

    pub fn log_run_completed(&self, report: &OptimizationReport) {
        info!(
            event = "run_completed",
            cluster = %self.cluster,
            service = %self.service,
            proposed_cpu = ?report.proposal.get(&ResourceDimension::Cpu),
            proposed_memory = ?report.proposal.get(&ResourceDimension::Memory),
            "Optimization run completed"
        );
    }

    pub fn log_run_failed(&self, err: &RunError) {
        warn!(
            event = "run_failed",
            cluster = %self.cluster,
            service = %self.service,
            stage = %err.stage,
            error_code = err.error.code(),
            error = %err.error,
            "Optimization run failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_metrics_recorded_and_encoded() {
        let metrics = OptimizerMetrics::new();
        metrics.observe_query_latency("describe_definition", 0.2);
        metrics.inc_run("success");

        let report = OptimizationReport::assemble(
            "metrics-cluster",
            "metrics-service",
            DesiredPercentage::default(),
            ResourceDefinition::new(256, 512, 0),
            BTreeMap::from([
                (ResourceDimension::Cpu, 40.0),
                (ResourceDimension::Memory, 60.0),
            ]),
            BTreeMap::from([
                (ResourceDimension::Cpu, 129),
                (ResourceDimension::Memory, 385),
            ]),
        )
        .unwrap();
        metrics.record_report(&report);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("ecs_optimizer_runs_total"));
        assert!(text.contains("ecs_optimizer_query_latency_seconds"));
        let proposed_cpu = text
            .lines()
            .find(|line| {
                line.starts_with("ecs_optimizer_proposed_allocation{")
                    && line.contains("cluster=\"metrics-cluster\"")
                    && line.contains("dimension=\"cpu\"")
            })
            .expect("proposed cpu sample");
        assert!(proposed_cpu.ends_with(" 129"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-cluster", "test-service");
        assert_eq!(logger.cluster, "test-cluster");
        assert_eq!(logger.service, "test-service");
    }
}
