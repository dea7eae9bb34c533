pub mod loadavg;
pub mod memory;
pub mod network;
pub mod os_status;
pub mod throttle;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::config::Config;
use crate::error::CollectError;
use crate::types::MetricBatch;

/// Trait for all metric collectors.
///
/// Each collector gathers one group of host metrics and adds them to the
/// batch it is given. The scheduler flushes whatever ended up in the batch
/// as a single transmission, even when `collect` returns an error.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Human-readable name for this collector (e.g., "loadavg", "memory")
    fn name(&self) -> &str;

    /// Collect one cycle's metrics into `batch`.
    async fn collect(&mut self, batch: &mut MetricBatch) -> Result<(), CollectError>;
}

/// Create all enabled collectors, in cycle order
pub fn create_collectors(config: &Config) -> Result<Vec<Box<dyn Collector>>> {
    let proc_root = config.agent.proc_root.as_path();
    let mut collectors: Vec<Box<dyn Collector>> = Vec::new();

    if config.collector.loadavg.enabled {
        collectors.push(Box::new(loadavg::LoadAvgCollector::new(proc_root)));
    }

    if config.collector.memory.enabled {
        collectors.push(Box::new(memory::MemoryCollector::new(proc_root)));
    }

    if config.collector.network.enabled {
        collectors.push(Box::new(network::NetworkCollector::new(proc_root, &config.collector.network)));
    }

    if config.collector.os_status.enabled {
        collectors.push(Box::new(os_status::OsStatusCollector::new(proc_root, &config.collector.os_status)));
    }

    tracing::info!(
        count = collectors.len(),
        names = ?collectors.iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
        "Initialized collectors"
    );
    Ok(collectors)
}

/// Read a whole text source, mapping failure to `SourceUnavailable`
pub(crate) async fn read_source(path: &Path) -> Result<String, CollectError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CollectError::unavailable(path.display().to_string(), e))
}
