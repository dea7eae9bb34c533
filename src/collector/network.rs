use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::NetworkCollectorConfig;
use crate::error::CollectError;
use crate::types::{MetricBatch, MetricName};
use super::{read_source, Collector};

/// Counter names in emission order
pub const FIELDS: [&str; 8] = [
    "bytes_sent",
    "bytes_recv",
    "packets_sent",
    "packets_recv",
    "errin",
    "errout",
    "dropin",
    "dropout",
];

/// Cumulative counters for one interface, as reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCounterSet {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

impl NetworkCounterSet {
    /// Values in the same order as `FIELDS`
    pub fn values(&self) -> [u64; 8] {
        [
            self.bytes_sent,
            self.bytes_recv,
            self.packets_sent,
            self.packets_recv,
            self.errin,
            self.errout,
            self.dropin,
            self.dropout,
        ]
    }
}

/// Parse /proc/net/dev.
///
/// Receive columns: bytes packets errs drop fifo frame compressed multicast,
/// then transmit: bytes packets errs drop fifo colls carrier compressed.
/// Any malformed interface line fails the whole parse.
pub fn parse_net_dev(source: &str, content: &str) -> Result<Vec<NetworkCounterSet>, CollectError> {
    let mut sets = Vec::new();

    for line in content.lines().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        // Old kernels glue the first counter to the colon ("eth0:1234")
        let (iface, counters) = line
            .split_once(':')
            .ok_or_else(|| CollectError::malformed(source, format!("no interface separator in {:?}", line)))?;
        let iface = iface.trim();

        let cols: Vec<u64> = counters
            .split_whitespace()
            .map(|c| c.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CollectError::malformed(source, format!("non-numeric counter for {}", iface)))?;

        if cols.len() < 16 {
            return Err(CollectError::malformed(
                source,
                format!("{} has {} counters, expected 16", iface, cols.len()),
            ));
        }

        sets.push(NetworkCounterSet {
            interface: iface.to_string(),
            bytes_recv: cols[0],
            packets_recv: cols[1],
            errin: cols[2],
            dropin: cols[3],
            bytes_sent: cols[8],
            packets_sent: cols[9],
            errout: cols[10],
            dropout: cols[11],
        });
    }

    Ok(sets)
}

/// Collects per-interface traffic counters from /proc/net/dev
pub struct NetworkCollector {
    path: PathBuf,
    exclude_interfaces: Vec<String>,
}

impl NetworkCollector {
    pub fn new(proc_root: &Path, config: &NetworkCollectorConfig) -> Self {
        Self {
            path: proc_root.join("net").join("dev"),
            exclude_interfaces: config.exclude_interfaces.clone(),
        }
    }
}

#[async_trait]
impl Collector for NetworkCollector {
    fn name(&self) -> &str { "network" }

    async fn collect(&mut self, batch: &mut MetricBatch) -> Result<(), CollectError> {
        let content = read_source(&self.path).await?;
        let sets = parse_net_dev(&self.path.display().to_string(), &content)?;

        for set in sets {
            if self.exclude_interfaces.iter().any(|e| *e == set.interface) { continue; }

            let base = MetricName::new(["network", set.interface.as_str()]);
            for (field, value) in FIELDS.into_iter().zip(set.values()) {
                batch.insert(base.child(field), value);
            }
        }
        Ok(())
    }
}
