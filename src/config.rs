use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            log_level: default_log_level(),
            proc_root: default_proc_root(),
        }
    }
}

/// Where the StatsD sink lives
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_sink_host")]
    pub host: String,
    #[serde(default = "default_sink_port")]
    pub port: u16,
    /// Overrides the hostname-derived prefix
    pub prefix: Option<String>,
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: default_sink_host(),
            port: default_sink_port(),
            prefix: None,
            max_packet_size: default_max_packet_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Sleep used when a cycle overruns the interval
    #[serde(default = "default_fallback_sleep")]
    pub fallback_sleep_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 10, fallback_sleep_secs: 8 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectorConfig {
    #[serde(default)]
    pub loadavg: LoadAvgCollectorConfig,
    #[serde(default)]
    pub memory: MemoryCollectorConfig,
    #[serde(default)]
    pub network: NetworkCollectorConfig,
    #[serde(default)]
    pub os_status: OsStatusCollectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadAvgCollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LoadAvgCollectorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryCollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MemoryCollectorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkCollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub exclude_interfaces: Vec<String>,
}

impl Default for NetworkCollectorConfig {
    fn default() -> Self {
        Self { enabled: true, exclude_interfaces: vec![] }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OsStatusCollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chance that the checks run on a given cycle
    #[serde(default = "default_sample_probability")]
    pub sample_probability: f64,
    #[serde(default = "default_reboot_sentinel")]
    pub reboot_sentinel: PathBuf,
    #[serde(default = "default_update_checker")]
    pub update_checker: PathBuf,
    #[serde(default = "default_update_check_timeout")]
    pub update_check_timeout_secs: u64,
}

impl Default for OsStatusCollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_probability: default_sample_probability(),
            reboot_sentinel: default_reboot_sentinel(),
            update_checker: default_update_checker(),
            update_check_timeout_secs: default_update_check_timeout(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            bail!("scheduler.interval_secs must be greater than zero");
        }
        if self.scheduler.fallback_sleep_secs == 0 {
            bail!("scheduler.fallback_sleep_secs must be greater than zero");
        }
        let p = self.collector.os_status.sample_probability;
        if !(0.0..=1.0).contains(&p) {
            bail!("collector.os_status.sample_probability must be within [0, 1], got {}", p);
        }
        if self.sink.port == 0 {
            bail!("sink.port must be non-zero");
        }
        if let Some(prefix) = &self.sink.prefix {
            if prefix.split('.').any(|segment| segment.trim().is_empty()) {
                bail!("sink.prefix must not contain empty segments, got {:?}", prefix);
            }
        }
        if self.sink.max_packet_size < 64 {
            bail!("sink.max_packet_size must be at least 64 bytes");
        }
        Ok(())
    }
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string())
}

// Default value functions
fn default_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
fn default_log_level() -> String { "info".to_string() }
fn default_proc_root() -> PathBuf { PathBuf::from("/proc") }
fn default_sink_host() -> String { "localhost".to_string() }
fn default_sink_port() -> u16 { 48125 }
fn default_max_packet_size() -> usize { 512 }
fn default_interval() -> u64 { 10 }
fn default_fallback_sleep() -> u64 { 8 }
fn default_true() -> bool { true }
fn default_sample_probability() -> f64 { 0.1 }
fn default_reboot_sentinel() -> PathBuf { PathBuf::from("/var/run/reboot-required") }
fn default_update_checker() -> PathBuf { PathBuf::from("/usr/lib/update-notifier/apt-check") }
fn default_update_check_timeout() -> u64 { 30 }
