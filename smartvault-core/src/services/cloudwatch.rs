/*!
CloudWatch metrics adapter.

All run statistics land in one fixed namespace so the alarm thresholds
configured outside this repository can aggregate them.
*/

use async_trait::async_trait;
use aws_sdk_cloudwatch::types::{MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client as CloudWatchClient;
use tracing::debug;

use super::{sdk_error_message, MetricUnit, MetricsSink};
use crate::{Result, VaultError};

/// Namespace all backup metrics are emitted under
pub const METRIC_NAMESPACE: &str = "SmartVault";

/// CloudWatch-backed metrics sink
#[derive(Debug, Clone)]
pub struct CloudWatchMetrics {
    client: CloudWatchClient,
}

impl CloudWatchMetrics {
    pub fn new(client: CloudWatchClient) -> Self {
        Self { client }
    }
}

impl From<MetricUnit> for StandardUnit {
    fn from(unit: MetricUnit) -> Self {
        match unit {
            MetricUnit::Count => StandardUnit::Count,
            MetricUnit::Gigabytes => StandardUnit::Gigabytes,
        }
    }
}

#[async_trait]
impl MetricsSink for CloudWatchMetrics {
    async fn put_metric(&self, name: &str, unit: MetricUnit, value: f64) -> Result<()> {
        let datum = MetricDatum::builder()
            .metric_name(name)
            .unit(StandardUnit::from(unit))
            .value(value)
            .build();

        self.client
            .put_metric_data()
            .namespace(METRIC_NAMESPACE)
            .metric_data(datum)
            .send()
            .await
            .map_err(|e| VaultError::telemetry(sdk_error_message("put_metric_data", &e)))?;

        debug!(metric = %name, value = value, "Emitted metric");
        Ok(())
    }
}
