//! Utilization averages per resource dimension
//!
//! The averager turns a dimension plus cluster/service scope into a metric
//! query over a fixed trailing window and validates the scalar average a
//! [`UtilizationSource`] returns for it.

use crate::error::{OptimizerError, Result};
use crate::models::{validate_identifiers, ResourceDimension};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Namespace under which ECS publishes service utilization
pub const METRIC_NAMESPACE: &str = "AWS/ECS";

/// Trailing window the average is computed over (30 days)
pub const UTILIZATION_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Aggregation period of a single datapoint (15 hours)
pub const AGGREGATION_PERIOD: Duration = Duration::from_secs(15 * 60 * 60);

pub const STATISTIC_AVERAGE: &str = "Average";
pub const UNIT_PERCENT: &str = "Percent";

/// A fully-scoped utilization query
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub dimension: ResourceDimension,
    pub namespace: String,
    pub metric_name: String,
    pub cluster: String,
    pub service: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub period: Duration,
    pub statistic: String,
    pub unit: String,
}

impl MetricQuery {
    /// Query for `dimension` over the window ending at `end_time`
    pub fn new(
        dimension: ResourceDimension,
        cluster: &str,
        service: &str,
        end_time: DateTime<Utc>,
    ) -> Self {
        let window = chrono::Duration::seconds(UTILIZATION_WINDOW.as_secs() as i64);

        Self {
            dimension,
            namespace: METRIC_NAMESPACE.to_string(),
            metric_name: dimension.metric_name().to_string(),
            cluster: cluster.to_string(),
            service: service.to_string(),
            start_time: end_time - window,
            end_time,
            period: AGGREGATION_PERIOD,
            statistic: STATISTIC_AVERAGE.to_string(),
            unit: UNIT_PERCENT.to_string(),
        }
    }

    /// Error for a window that produced no datapoints
    pub fn no_data(&self) -> OptimizerError {
        OptimizerError::NoDataAvailable {
            metric: self.metric_name.clone(),
            cluster: self.cluster.clone(),
            service: self.service.clone(),
        }
    }
}

/// Supplies the average utilization percentage for a query
///
/// Implementations return `NoDataAvailable` when the window is empty and
/// `SourceUnavailable` when the query itself fails or times out.
#[async_trait]
pub trait UtilizationSource: Send + Sync {
    async fn average_utilization(&self, query: &MetricQuery) -> Result<f64>;
}

/// Arithmetic mean of per-period averages, `None` when there are none
pub fn mean_of_averages<I>(averages: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = averages
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Fetches and validates one utilization average per dimension
#[derive(Clone)]
pub struct MetricsAverager {
    source: Arc<dyn UtilizationSource>,
}

impl MetricsAverager {
    pub fn new(source: Arc<dyn UtilizationSource>) -> Self {
        Self { source }
    }

    /// Average utilization of `dimension` over the window ending now
    pub async fn average(
        &self,
        dimension: ResourceDimension,
        cluster: &str,
        service: &str,
    ) -> Result<f64> {
        self.average_until(dimension, cluster, service, Utc::now())
            .await
    }

    /// Average utilization of `dimension` over the window ending at `end_time`
    pub async fn average_until(
        &self,
        dimension: ResourceDimension,
        cluster: &str,
        service: &str,
        end_time: DateTime<Utc>,
    ) -> Result<f64> {
        validate_identifiers(cluster, service)?;

        let query = MetricQuery::new(dimension, cluster, service, end_time);
        debug!(
            metric = %query.metric_name,
            start = %query.start_time,
            end = %query.end_time,
            period_secs = query.period.as_secs(),
            "Querying utilization average"
        );

        let average = self.source.average_utilization(&query).await?;

        if !average.is_finite() || average < 0.0 {
            return Err(OptimizerError::source_unavailable(
                query.metric_name,
                format!("source returned invalid average {}", average),
            ));
        }

        Ok(average)
    }
}
