use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::CollectError;
use crate::types::{MetricBatch, MetricName};
use super::{read_source, Collector};

const WINDOWS: [&str; 3] = ["1m", "5m", "15m"];

/// Collects the 1/5/15 minute load averages from /proc/loadavg
pub struct LoadAvgCollector {
    path: PathBuf,
}

impl LoadAvgCollector {
    pub fn new(proc_root: &Path) -> Self {
        Self { path: proc_root.join("loadavg") }
    }
}

/// Parse the first three fields of /proc/loadavg
pub fn parse_loadavg(source: &str, content: &str) -> Result<[f64; 3], CollectError> {
    let mut values = [0.0; 3];
    let mut fields = content.split_whitespace();

    for (slot, window) in values.iter_mut().zip(WINDOWS) {
        let field = fields
            .next()
            .ok_or_else(|| CollectError::malformed(source, format!("missing {} load average", window)))?;
        *slot = field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CollectError::malformed(source, format!("non-numeric {} load average: {:?}", window, field)))?;
    }

    Ok(values)
}

#[async_trait]
impl Collector for LoadAvgCollector {
    fn name(&self) -> &str { "loadavg" }

    async fn collect(&mut self, batch: &mut MetricBatch) -> Result<(), CollectError> {
        let content = read_source(&self.path).await?;
        let values = parse_loadavg(&self.path.display().to_string(), &content)?;

        for (window, value) in WINDOWS.into_iter().zip(values) {
            batch.insert(MetricName::new(["loadavg", window]), value);
        }
        Ok(())
    }
}
