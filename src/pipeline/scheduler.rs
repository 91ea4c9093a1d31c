//! Background scheduler
//!
//! Three periodic jobs, each on its own `tokio::time::interval`:
//!
//! - rule check: `DeviceMonitor::check_all` over every device with samples
//! - retry sweep: `NotificationDispatcher::retry_due`
//! - cleanup: `AlertManager::purge` of closed alerts past retention
//!
//! Rule check and cleanup share one task; the retry sweep runs on a task of
//! its own. Both stop when the `CancellationToken` fires. A failing job is
//! logged and retried on its next tick.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::monitor::DeviceMonitor;
use crate::config::SchedulerConfig;
use crate::notify::NotificationDispatcher;

/// Counters reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub rule_checks: u64,
    pub alerts_created: u64,
    pub retry_sweeps: u64,
    pub retries_claimed: u64,
    pub cleanups: u64,
    pub alerts_purged: u64,
}

pub struct Scheduler {
    config: SchedulerConfig,
    monitor: Arc<DeviceMonitor>,
    dispatcher: Option<NotificationDispatcher>,
}

fn ticker(secs: u64) -> Interval {
    let mut ticker = interval(StdDuration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, monitor: Arc<DeviceMonitor>) -> Self {
        Self {
            config,
            monitor,
            dispatcher: None,
        }
    }

    /// Enable the notification retry sweep.
    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub async fn run(self, cancel: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();

        info!(
            rule_check_secs = self.config.rule_check_interval_secs,
            retry_sweep_secs = self.config.retry_sweep_interval_secs,
            cleanup_secs = self.config.cleanup_interval_secs,
            "[Scheduler] Started"
        );

        // The retry sweep ticks on its own task so a long rule check never
        // holds it back.
        let sweeper = self.dispatcher.clone().map(|dispatcher| {
            tokio::spawn(sweep_loop(
                dispatcher,
                self.config.retry_sweep_interval_secs,
                cancel.clone(),
            ))
        });

        let mut rule_check = ticker(self.config.rule_check_interval_secs);
        let mut cleanup = ticker(self.config.cleanup_interval_secs);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Scheduler] Shutdown signal received");
                    break;
                }
                _ = rule_check.tick() => {
                    stats.rule_checks += 1;
                    match self.monitor.check_all(Utc::now()).await {
                        Ok(summary) => stats.alerts_created += summary.alerts_created as u64,
                        Err(e) => warn!(error = ?e, "[Scheduler] Rule check failed"),
                    }
                }
                _ = cleanup.tick() => {
                    stats.cleanups += 1;
                    match self.monitor.alert_manager().purge(Utc::now()) {
                        Ok(removed) => stats.alerts_purged += removed as u64,
                        Err(e) => warn!(error = %e, "[Scheduler] Cleanup failed"),
                    }
                }
            }
        }

        if let Some(handle) = sweeper {
            match handle.await {
                Ok((sweeps, claimed)) => {
                    stats.retry_sweeps = sweeps;
                    stats.retries_claimed = claimed;
                }
                Err(e) => error!(error = %e, "[Scheduler] Retry sweep task panicked"),
            }
        }

        debug!(?stats, "[Scheduler] Stopped");
        stats
    }
}

/// Returns `(sweeps, tasks claimed)` once cancelled.
async fn sweep_loop(
    dispatcher: NotificationDispatcher,
    interval_secs: u64,
    cancel: CancellationToken,
) -> (u64, u64) {
    let mut retry_sweep = ticker(interval_secs);
    let (mut sweeps, mut claimed) = (0, 0);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = retry_sweep.tick() => {
                sweeps += 1;
                match dispatcher.retry_due(Utc::now()).await {
                    Ok(n) => claimed += n as u64,
                    Err(e) => warn!(error = %e, "[Scheduler] Retry sweep failed"),
                }
            }
        }
    }
    (sweeps, claimed)
}
