#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;

use watchtower::config::Config;
use watchtower::sink::{MetricSink, Observation};

pub const MEMINFO: &str = "\
MemTotal:        1000000 kB
MemFree:          500000 kB
Buffers:          100000 kB
Cached:           200000 kB
SwapTotal:             0 kB
SwapFree:              0 kB
";

pub const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:  5000      50    1    0    0     0          0         0     7000      70    0    2    0     0       0          0
";

/// Records every transmission for later inspection
#[derive(Default)]
pub struct RecordingSink {
    pub transmissions: Mutex<Vec<Vec<Observation>>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<String> {
        self.transmissions
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|o| o.name().to_string())
            .collect()
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    fn name(&self) -> &str { "recording" }

    async fn transmit(&self, observations: &[Observation]) -> Result<()> {
        self.transmissions.lock().unwrap().push(observations.to_vec());
        Ok(())
    }
}

/// Lay out a fake /proc under `root` and point a config at it
pub fn fake_host(root: &Path) -> Config {
    std::fs::create_dir_all(root.join("net")).unwrap();
    std::fs::write(root.join("loadavg"), "0.10 0.20 0.30 1/200 999\n").unwrap();
    std::fs::write(root.join("meminfo"), MEMINFO).unwrap();
    std::fs::write(root.join("net/dev"), NET_DEV).unwrap();
    std::fs::write(root.join("uptime"), "1234.50 999.00\n").unwrap();

    let mut config = Config::default();
    config.agent.hostname = "web01.example.com".to_string();
    config.agent.proc_root = root.to_path_buf();
    config.collector.os_status.sample_probability = 1.0;
    config.collector.os_status.reboot_sentinel = root.join("reboot-required");
    config.collector.os_status.update_checker = root.join("apt-check");
    config
}
