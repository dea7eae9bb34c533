use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::CollectError;
use crate::types::{MetricBatch, MetricName};
use super::{read_source, Collector};

/// Fields kept from /proc/meminfo; everything else is ignored
const WHITELIST: [&str; 6] = ["MemTotal", "MemFree", "Buffers", "Cached", "SwapTotal", "SwapFree"];

/// Whitelisted /proc/meminfo fields, converted from kB to bytes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub total: f64,
    pub free: f64,
    pub buffers: f64,
    pub cached: f64,
    pub swap_total: Option<f64>,
    pub swap_free: Option<f64>,
}

impl MemorySnapshot {
    /// Parse `Key: value kB` lines. Required fields missing, or a
    /// whitelisted field that is not numeric, is a `MalformedSource`.
    pub fn parse(source: &str, content: &str) -> Result<Self, CollectError> {
        let mut fields: [Option<f64>; 6] = [None; 6];

        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else { continue };
            let key = key.trim();
            let Some(idx) = WHITELIST.iter().position(|k| *k == key) else { continue };

            let raw = rest.split_whitespace().next().unwrap_or("");
            let kb = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| CollectError::malformed(source, format!("{} is not numeric: {:?}", key, raw)))?;
            fields[idx] = Some(kb * 1024.0);
        }

        let require = |idx: usize| {
            fields[idx].ok_or_else(|| CollectError::malformed(source, format!("{} missing", WHITELIST[idx])))
        };

        let snapshot = Self {
            total: require(0)?,
            free: require(1)?,
            buffers: require(2)?,
            cached: require(3)?,
            swap_total: fields[4],
            swap_free: fields[5],
        };

        if snapshot.total <= 0.0 {
            return Err(CollectError::malformed(source, "MemTotal is zero"));
        }
        if snapshot.has_swap() && snapshot.swap_free.is_none() {
            return Err(CollectError::malformed(source, "SwapTotal present without SwapFree"));
        }

        Ok(snapshot)
    }

    fn has_swap(&self) -> bool {
        self.swap_total.is_some_and(|t| t > 0.0)
    }

    /// Derived usage figures in bytes and percent, in emission order.
    /// Swap and total figures only appear on hosts with swap configured.
    pub fn derive(&self) -> Vec<(&'static str, f64)> {
        let pct = |part: f64, whole: f64| 100.0 * part / whole;

        let buffer = self.buffers;
        let cache = self.cached;
        let rss = self.total - self.free - buffer - cache;
        let ram_used = buffer + cache + rss;

        let mut derived = vec![
            ("buffer", buffer),
            ("buffer_pct", pct(buffer, self.total)),
            ("cache", cache),
            ("cache_pct", pct(cache, self.total)),
            ("rss", rss),
            ("rss_pct", pct(rss, self.total)),
            ("ram_used", ram_used),
            ("ram_used_pct", pct(ram_used, self.total)),
        ];

        if let (true, Some(swap_total), Some(swap_free)) = (self.has_swap(), self.swap_total, self.swap_free) {
            let swap = swap_total - swap_free;
            let total_used = ram_used + swap;
            derived.extend([
                ("swap", swap),
                ("swap_pct", pct(swap, swap_total)),
                ("total_used", total_used),
                ("total_used_pct", pct(total_used, self.total + swap_total)),
            ]);
        }

        derived
    }
}

/// Collects memory usage metrics from /proc/meminfo
pub struct MemoryCollector {
    path: PathBuf,
}

impl MemoryCollector {
    pub fn new(proc_root: &Path) -> Self {
        Self { path: proc_root.join("meminfo") }
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    fn name(&self) -> &str { "memory" }

    async fn collect(&mut self, batch: &mut MetricBatch) -> Result<(), CollectError> {
        let content = read_source(&self.path).await?;
        let snapshot = MemorySnapshot::parse(&self.path.display().to_string(), &content)?;

        for (name, value) in snapshot.derive() {
            batch.insert(MetricName::new(["memory", name]), value);
        }
        Ok(())
    }
}
