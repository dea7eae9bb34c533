pub mod log;
pub mod statsd;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::types::{MetricBatch, MetricName, MetricValue};

/// A single observation handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Gauge(MetricName, MetricValue),
    Timing(MetricName, Duration),
}

impl Observation {
    pub fn name(&self) -> &MetricName {
        match self {
            Observation::Gauge(name, _) | Observation::Timing(name, _) => name,
        }
    }
}

/// Trait for metric destinations.
///
/// `transmit` is one pipelined transmission: everything passed in a single
/// call goes out together. Delivery is fire-and-forget.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Sink name, used in logs
    fn name(&self) -> &str;

    /// Send a group of observations as one transmission
    async fn transmit(&self, observations: &[Observation]) -> Result<()>;

    async fn gauge(&self, name: &MetricName, value: MetricValue) -> Result<()> {
        self.transmit(&[Observation::Gauge(name.clone(), value)]).await
    }

    async fn timing(&self, name: &MetricName, elapsed: Duration) -> Result<()> {
        self.transmit(&[Observation::Timing(name.clone(), elapsed)]).await
    }

    /// Pipeline a whole batch as gauges
    async fn send_batch(&self, batch: &MetricBatch) -> Result<()> {
        let observations: Vec<Observation> = batch
            .iter()
            .map(|(name, value)| Observation::Gauge(name.clone(), *value))
            .collect();
        self.transmit(&observations).await
    }

    /// Release the underlying connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
