use anyhow::Result;
use async_trait::async_trait;

use super::{MetricSink, Observation};

/// Sink that logs every observation instead of sending it (`--dry-run`)
pub struct LogSink;

#[async_trait]
impl MetricSink for LogSink {
    fn name(&self) -> &str { "log" }

    async fn transmit(&self, observations: &[Observation]) -> Result<()> {
        for obs in observations {
            match obs {
                Observation::Gauge(name, value) => {
                    tracing::info!(name = %name, value = %value, "gauge");
                }
                Observation::Timing(name, elapsed) => {
                    tracing::info!(name = %name, ms = elapsed.as_millis() as u64, "timing");
                }
            }
        }
        Ok(())
    }
}
