//! Policy-driven task scheduler.
//!
//! Watcher tasks run sequentially on one loop: each tick, every task whose
//! policy says it is due gets executed to completion before the next one
//! starts. That sequencing is what lets the whole process share a single
//! SSO session without locking. Shutdown is cooperative, checked once per
//! tick; in-flight HTTP calls run to their own timeouts.

use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::watchers::Watcher;

/// When a task should run. A small closed set rather than an open policy
/// hierarchy; anything fancier belongs in an external scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Run when at least `seconds` have passed since the last run
    Interval { seconds: u64 },
    /// Run once per day at or after the given local time
    Daily { hour: u32, minute: u32 },
}

/// Re-run guard for `Daily`: once a run has happened, stay quiet for at
/// least this long so repeated ticks inside the target minute don't fire twice
const DAILY_RERUN_GUARD_SECS: i64 = 3600;

impl SchedulePolicy {
    pub fn is_due(&self, last_run: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
        match *self {
            SchedulePolicy::Interval { seconds } => match last_run {
                None => true,
                Some(at) => (now - at).num_seconds() >= seconds as i64,
            },
            SchedulePolicy::Daily { hour, minute } => {
                if (now.hour(), now.minute()) < (hour, minute) {
                    return false;
                }
                match last_run {
                    None => true,
                    Some(at) => (now - at).num_seconds() > DAILY_RERUN_GUARD_SECS,
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            SchedulePolicy::Interval { seconds } => {
                let minutes = seconds / 60;
                if minutes > 0 {
                    format!("every {}m {}s", minutes, seconds % 60)
                } else {
                    format!("every {seconds}s")
                }
            }
            SchedulePolicy::Daily { hour, minute } => {
                format!("daily at {hour:02}:{minute:02}")
            }
        }
    }
}

struct ScheduledTask {
    name: String,
    watcher: Box<dyn Watcher>,
    policy: SchedulePolicy,
    last_run: Option<DateTime<Local>>,
}

/// Runs registered watchers according to their policies
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn add_task(&mut self, policy: SchedulePolicy, watcher: Box<dyn Watcher>) {
        info!(
            task = watcher.name(),
            schedule = %policy.describe(),
            "task registered"
        );
        self.tasks.push(ScheduledTask {
            name: watcher.name().to_string(),
            watcher,
            policy,
            last_run: None,
        });
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Execute every due task once, sequentially. Returns how many succeeded.
    pub async fn run_due_tasks(&mut self) -> usize {
        let now = Local::now();
        let mut succeeded = 0;

        for task in &mut self.tasks {
            if !task.policy.is_due(task.last_run, now) {
                continue;
            }
            info!(task = %task.name, "running task");
            let ok = task.watcher.run().await;
            task.last_run = Some(Local::now());
            if ok {
                succeeded += 1;
                info!(task = %task.name, "task completed");
            } else {
                warn!(task = %task.name, "task failed");
            }
        }

        succeeded
    }

    /// Main loop: tick every `check_interval`, run due tasks, and stop when
    /// the shutdown flag flips
    pub async fn run(&mut self, check_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(tasks = self.tasks.len(), "scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(check_interval) => {
                    self.run_due_tasks().await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means stop
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
