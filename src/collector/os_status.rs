use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::OsStatusCollectorConfig;
use crate::error::CollectError;
use crate::types::{MetricBatch, MetricName};
use super::throttle::Throttle;
use super::{read_source, Collector};

/// Pending package updates reported by the update checker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCounts {
    pub regular: u64,
    pub security: u64,
}

/// Parse the `<regular>;<security>` pair printed by apt-check
pub fn parse_update_counts(output: &str) -> Result<UpdateCounts, CollectError> {
    let output = output.trim();
    let (regular, security) = output
        .split_once(';')
        .ok_or_else(|| CollectError::adapter("update check", format!("expected \"regular;security\", got {:?}", output)))?;

    let count = |raw: &str| {
        raw.trim()
            .parse::<u64>()
            .map_err(|_| CollectError::adapter("update check", format!("non-numeric count {:?}", raw)))
    };

    Ok(UpdateCounts { regular: count(regular)?, security: count(security)? })
}

/// Answers "how many updates are pending?"
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// `Ok(None)` when no checker is installed on this host
    async fn check_updates(&self) -> Result<Option<UpdateCounts>, CollectError>;
}

/// Runs Ubuntu's update-notifier `apt-check`, which reports on stderr
pub struct AptCheck {
    path: PathBuf,
    timeout: Duration,
}

impl AptCheck {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { path: path.into(), timeout }
    }
}

#[async_trait]
impl UpdateChecker for AptCheck {
    async fn check_updates(&self) -> Result<Option<UpdateCounts>, CollectError> {
        if !is_file(&self.path).await {
            return Ok(None);
        }

        let mut cmd = Command::new(&self.path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CollectError::adapter("update check", format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| CollectError::adapter("update check", format!("failed to run {}: {}", self.path.display(), e)))?;

        if !output.status.success() {
            return Err(CollectError::adapter(
                "update check",
                format!("{} exited with {}", self.path.display(), output.status),
            ));
        }

        parse_update_counts(&String::from_utf8_lossy(&output.stderr)).map(Some)
    }
}

/// Reboot flag, pending updates and uptime. Throttled, since these change slowly.
pub struct OsStatusCollector {
    throttle: Throttle,
    updates: Box<dyn UpdateChecker>,
    reboot_sentinel: PathBuf,
    uptime_path: PathBuf,
}

impl OsStatusCollector {
    pub fn new(proc_root: &Path, config: &OsStatusCollectorConfig) -> Self {
        Self {
            throttle: Throttle::new(config.sample_probability),
            updates: Box::new(AptCheck::new(
                &config.update_checker,
                Duration::from_secs(config.update_check_timeout_secs),
            )),
            reboot_sentinel: config.reboot_sentinel.clone(),
            uptime_path: proc_root.join("uptime"),
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_update_checker(mut self, checker: Box<dyn UpdateChecker>) -> Self {
        self.updates = checker;
        self
    }

    async fn read_uptime(&self) -> Result<f64, CollectError> {
        let source = self.uptime_path.display().to_string();
        let content = read_source(&self.uptime_path).await?;
        let first = content
            .split_whitespace()
            .next()
            .ok_or_else(|| CollectError::malformed(&source, "empty"))?;
        first
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CollectError::malformed(&source, format!("non-numeric uptime {:?}", first)))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

#[async_trait]
impl Collector for OsStatusCollector {
    fn name(&self) -> &str { "os_status" }

    async fn collect(&mut self, batch: &mut MetricBatch) -> Result<(), CollectError> {
        if !self.throttle.should_run() {
            return Ok(());
        }

        let restart_required = is_file(&self.reboot_sentinel).await;
        batch.insert(MetricName::new(["os", "restart_required"]), u64::from(restart_required));

        let mut failures = Vec::new();

        match self.updates.check_updates().await {
            Ok(Some(counts)) => {
                batch.insert(MetricName::new(["os", "updates", "regular"]), counts.regular);
                batch.insert(MetricName::new(["os", "updates", "security"]), counts.security);
            }
            Ok(None) => debug!("No update checker installed"),
            Err(e) => failures.push(e),
        }

        match self.read_uptime().await {
            Ok(uptime) => batch.insert(MetricName::new(["os", "uptime"]), uptime),
            Err(e) => failures.push(e),
        }

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                for extra in failures {
                    warn!(collector = "os_status", kind = extra.kind(), error = %extra, "OS status check failed");
                }
                Err(first)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::throttle::FixedRandom;
    use crate::types::MetricValue;

    struct StubChecker(fn() -> Result<Option<UpdateCounts>, CollectError>);

    #[async_trait]
    impl UpdateChecker for StubChecker {
        async fn check_updates(&self) -> Result<Option<UpdateCounts>, CollectError> {
            (self.0)()
        }
    }

    fn collector(dir: &Path, draw: f64, checker: StubChecker) -> OsStatusCollector {
        let config = OsStatusCollectorConfig {
            reboot_sentinel: dir.join("reboot-required"),
            ..OsStatusCollectorConfig::default()
        };
        OsStatusCollector::new(dir, &config)
            .with_throttle(Throttle::with_source(0.1, Box::new(FixedRandom(draw))))
            .with_update_checker(Box::new(checker))
    }

    #[test]
    fn parses_update_counts() {
        assert_eq!(parse_update_counts("12;3").unwrap(), UpdateCounts { regular: 12, security: 3 });
        assert_eq!(parse_update_counts(" 0;0\n").unwrap(), UpdateCounts { regular: 0, security: 0 });
    }

    #[test]
    fn malformed_update_output_is_adapter_failure() {
        assert_eq!(parse_update_counts("12").unwrap_err().kind(), "adapter_failure");
        assert_eq!(parse_update_counts("a;b").unwrap_err().kind(), "adapter_failure");
        assert_eq!(parse_update_counts("").unwrap_err().kind(), "adapter_failure");
    }

    #[tokio::test]
    async fn throttled_cycle_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "350735.47 234388.90\n").unwrap();

        let mut collector = collector(dir.path(), 0.9, StubChecker(|| Ok(None)));
        let mut batch = MetricBatch::new();
        collector.collect(&mut batch).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn reports_sentinel_updates_and_uptime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "350735.47 234388.90\n").unwrap();

        let mut collector = collector(
            dir.path(),
            0.0,
            StubChecker(|| Ok(Some(UpdateCounts { regular: 7, security: 2 }))),
        );

        let mut batch = MetricBatch::new();
        collector.collect(&mut batch).await.unwrap();
        assert_eq!(batch.get("os.restart_required"), Some(MetricValue::Integer(0)));
        assert_eq!(batch.get("os.updates.regular"), Some(MetricValue::Integer(7)));
        assert_eq!(batch.get("os.updates.security"), Some(MetricValue::Integer(2)));
        assert_eq!(batch.get("os.uptime"), Some(MetricValue::Float(350735.47)));

        std::fs::write(dir.path().join("reboot-required"), "*** System restart required ***\n").unwrap();
        let mut batch = MetricBatch::new();
        collector.collect(&mut batch).await.unwrap();
        assert_eq!(batch.get("os.restart_required"), Some(MetricValue::Integer(1)));
    }

    #[tokio::test]
    async fn failed_update_check_keeps_other_metrics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "100.5 80.0\n").unwrap();

        let mut collector = collector(
            dir.path(),
            0.0,
            StubChecker(|| Err(CollectError::adapter("update check", "garbled"))),
        );

        let mut batch = MetricBatch::new();
        let err = collector.collect(&mut batch).await.unwrap_err();
        assert_eq!(err.kind(), "adapter_failure");
        assert_eq!(batch.get("os.restart_required"), Some(MetricValue::Integer(0)));
        assert_eq!(batch.get("os.uptime"), Some(MetricValue::Float(100.5)));
        assert!(batch.get("os.updates.regular").is_none());
    }

    #[tokio::test]
    async fn missing_uptime_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(dir.path(), 0.0, StubChecker(|| Ok(None)));

        let mut batch = MetricBatch::new();
        let err = collector.collect(&mut batch).await.unwrap_err();
        assert_eq!(err.kind(), "source_unavailable");
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn non_numeric_uptime_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "forever\n").unwrap();
        let mut collector = collector(dir.path(), 0.0, StubChecker(|| Ok(None)));

        let mut batch = MetricBatch::new();
        assert_eq!(collector.collect(&mut batch).await.unwrap_err().kind(), "malformed_source");
    }

    #[tokio::test]
    async fn nan_uptime_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("uptime"), "NaN 1.0\n").unwrap();
        let mut collector = collector(dir.path(), 0.0, StubChecker(|| Ok(None)));

        let mut batch = MetricBatch::new();
        assert_eq!(collector.collect(&mut batch).await.unwrap_err().kind(), "malformed_source");
        assert!(batch.get("os.uptime").is_none());
    }

    #[tokio::test]
    async fn absent_checker_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let checker = AptCheck::new(dir.path().join("apt-check"), Duration::from_secs(5));
        assert_eq!(checker.check_updates().await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_checker_is_adapter_failure() {
        // /bin/sh with stdin closed exits cleanly and prints nothing
        let checker = AptCheck::new("/bin/sh", Duration::from_secs(5));
        let err = checker.check_updates().await.unwrap_err();
        assert_eq!(err.kind(), "adapter_failure");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_counts_from_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("apt-check");
        std::fs::write(&script, "#!/bin/sh\necho '4;1' >&2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let checker = AptCheck::new(&script, Duration::from_secs(5));
        assert_eq!(
            checker.check_updates().await.unwrap(),
            Some(UpdateCounts { regular: 4, security: 1 })
        );
    }
}
