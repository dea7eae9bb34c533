use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::SchedulerConfig;
use crate::sink::MetricSink;
use crate::types::{CycleTiming, MetricBatch, MetricName};

/// How long to sleep after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Remainder of the interval
    Remainder(Duration),
    /// The cycle overran the interval; sleep a fixed amount instead of busy-looping
    Fallback(Duration),
}

impl SleepPlan {
    pub fn duration(&self) -> Duration {
        match *self {
            SleepPlan::Remainder(d) | SleepPlan::Fallback(d) => d,
        }
    }
}

/// Drift correction: sleep `interval - elapsed`, or `fallback` when that would be negative
pub fn plan_sleep(interval_secs: u64, elapsed_secs: u64, fallback_secs: u64) -> SleepPlan {
    match interval_secs.checked_sub(elapsed_secs) {
        Some(remaining) => SleepPlan::Remainder(Duration::from_secs(remaining)),
        None => SleepPlan::Fallback(Duration::from_secs(fallback_secs)),
    }
}

/// Drives every collector once per interval and reports how long that took
pub struct Scheduler {
    collectors: Vec<Box<dyn Collector>>,
    sink: Arc<dyn MetricSink>,
    interval_secs: u64,
    fallback_sleep_secs: u64,
    cycle_metric: MetricName,
}

impl Scheduler {
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        sink: Arc<dyn MetricSink>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            collectors,
            sink,
            interval_secs: config.interval_secs,
            fallback_sleep_secs: config.fallback_sleep_secs,
            cycle_metric: MetricName::new(["watchtower", "gathering"]),
        }
    }

    /// Run every collector once, in order.
    ///
    /// A failing collector is logged and the cycle carries on. Whatever a
    /// collector managed to put in its batch is still sent, as one
    /// transmission per collector.
    pub async fn run_cycle(&mut self) -> CycleTiming {
        let started_at = Utc::now();
        let start = Instant::now();

        for collector in self.collectors.iter_mut() {
            let mut batch = MetricBatch::new();
            if let Err(e) = collector.collect(&mut batch).await {
                warn!(collector = collector.name(), kind = e.kind(), error = %e, "Collection failed");
            }

            if batch.is_empty() {
                continue;
            }
            if let Err(e) = self.sink.send_batch(&batch).await {
                warn!(collector = collector.name(), sink = self.sink.name(), error = %e, "Failed to send metrics");
            }
        }

        let elapsed = start.elapsed();
        if let Err(e) = self.sink.timing(&self.cycle_metric, elapsed).await {
            warn!(sink = self.sink.name(), error = %e, "Failed to send cycle timer");
        }

        CycleTiming { started_at, elapsed }
    }

    /// Decide the post-cycle sleep, logging overruns
    pub fn next_sleep(&self, timing: &CycleTiming) -> SleepPlan {
        let plan = plan_sleep(self.interval_secs, timing.elapsed_secs(), self.fallback_sleep_secs);
        match plan {
            SleepPlan::Remainder(d) => {
                debug!(elapsed_secs = timing.elapsed_secs(), sleep_secs = d.as_secs(), "Cycle complete");
            }
            SleepPlan::Fallback(d) => {
                warn!(
                    elapsed_secs = timing.elapsed_secs(),
                    interval_secs = self.interval_secs,
                    sleep_secs = d.as_secs(),
                    "Cycle overran interval, using fallback sleep"
                );
            }
        }
        plan
    }

    /// Loop forever; only returns when the task is dropped
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.interval_secs,
            collectors = self.collectors.len(),
            "Scheduler started"
        );

        loop {
            let timing = self.run_cycle().await;
            let plan = self.next_sleep(&timing);
            tokio::time::sleep(plan.duration()).await;
        }
    }
}
