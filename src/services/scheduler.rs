//! Clock-driven job scheduler.
//!
//! Jobs run on tokio tasks at wall-clock times. Each dispatch checks the
//! execution window, takes the per-job running guard, and retries failures
//! with a fixed backoff. Failures are logged and recorded, never propagated.

use crate::error::Result;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDateTime, Timelike, Utc, Weekday};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A unit of scheduled work.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self) -> BoxFuture<'_, Result<()>>;
}

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Every hour at the given minute.
    HourlyAt { minute: u32 },
    /// Fixed interval from the previous run.
    Every(Duration),
}

impl Schedule {
    /// Next fire time strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            Self::HourlyAt { minute } => {
                let candidate = now
                    .with_minute((*minute).min(59))
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(now);
                if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::hours(1)
                }
            }
            Self::Every(interval) => {
                now + ChronoDuration::from_std(*interval).unwrap_or_else(|_| ChronoDuration::hours(1))
            }
        }
    }

    /// Next fire time after both `now` and the last slot already fired.
    ///
    /// The wall clock can step backwards while the loop sleeps on the
    /// monotonic clock. A slot that already fired is never returned again.
    pub fn next_run(&self, now: NaiveDateTime, last_fired: Option<NaiveDateTime>) -> NaiveDateTime {
        let anchor = last_fired.map_or(now, |last| last.max(now));
        self.next_after(anchor)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::HourlyAt { minute } => format!("hourly at :{:02}", minute),
            Self::Every(interval) => format!("every {}s", interval.as_secs()),
        }
    }
}

/// Times at which dispatches are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionWindow {
    pub skip_weekends: bool,
    pub blackout_hours: Vec<u32>,
}

impl Default for ExecutionWindow {
    fn default() -> Self {
        Self {
            skip_weekends: true,
            blackout_hours: vec![0],
        }
    }
}

impl ExecutionWindow {
    pub fn allows(&self, at: NaiveDateTime) -> bool {
        if self.skip_weekends && matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.blackout_hours.contains(&at.hour())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(60),
        }
    }
}

/// Names of jobs currently running.
#[derive(Debug, Clone, Default)]
pub struct JobGuard {
    running: Arc<DashMap<String, DateTime<Utc>>>,
}

impl JobGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as running, or `None` if it already is.
    pub fn try_acquire(&self, name: &str) -> Option<JobPermit> {
        use dashmap::mapref::entry::Entry;

        match self.running.entry(name.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Some(JobPermit {
                    name: name.to_string(),
                    running: Arc::clone(&self.running),
                })
            }
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    pub fn running_since(&self, name: &str) -> Option<DateTime<Utc>> {
        self.running.get(name).map(|entry| *entry.value())
    }
}

/// Held while a job runs. Dropping it frees the name.
#[derive(Debug)]
pub struct JobPermit {
    name: String,
    running: Arc<DashMap<String, DateTime<Utc>>>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.running.remove(&self.name);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed,
    Failed,
    AlreadyRunning,
    OutsideWindow,
}

/// One dispatch of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub run_id: Uuid,
    pub job: String,
    pub scheduled_for: NaiveDateTime,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: DispatchOutcome,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Bounded log of recent dispatches, newest last.
#[derive(Debug)]
pub struct JobHistory {
    capacity: usize,
    events: RwLock<VecDeque<JobEvent>>,
}

impl JobHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn record(&self, event: JobEvent) {
        let mut events = self.events.write().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Up to `limit` most recent events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<JobEvent> {
        self.events.read().await.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub minute: u32,
    pub window: ExecutionWindow,
    pub retry: RetryPolicy,
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            minute: 16,
            window: ExecutionWindow::default(),
            retry: RetryPolicy::default(),
            history_capacity: 100,
        }
    }
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub schedule: String,
    pub running: bool,
    pub running_since: Option<DateTime<Utc>>,
    pub next_run: NaiveDateTime,
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    schedule: Schedule,
}

pub struct Scheduler {
    jobs: std::sync::RwLock<Vec<ScheduledJob>>,
    window: ExecutionWindow,
    retry: RetryPolicy,
    guard: JobGuard,
    history: JobHistory,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            jobs: std::sync::RwLock::new(Vec::new()),
            window: config.window.clone(),
            retry: config.retry,
            guard: JobGuard::new(),
            history: JobHistory::new(config.history_capacity),
            shutdown_tx,
        }
    }

    pub fn add(&self, job: Arc<dyn Job>, schedule: Schedule) {
        info!("Scheduled job {} ({})", job.name(), schedule.describe());
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.push(ScheduledJob { job, schedule });
        }
    }

    pub fn guard(&self) -> &JobGuard {
        &self.guard
    }

    pub fn history(&self) -> &JobHistory {
        &self.history
    }

    pub fn statuses(&self, now: NaiveDateTime) -> Vec<JobStatus> {
        let Ok(jobs) = self.jobs.read() else {
            return Vec::new();
        };
        jobs.iter()
            .map(|s| {
                let name = s.job.name().to_string();
                JobStatus {
                    running: self.guard.is_running(&name),
                    running_since: self.guard.running_since(&name),
                    schedule: s.schedule.describe(),
                    next_run: s.schedule.next_after(now),
                    name,
                }
            })
            .collect()
    }

    /// Run one job now, honouring the window, guard and retry policy.
    pub async fn dispatch(&self, job: &dyn Job, scheduled_for: NaiveDateTime) -> DispatchOutcome {
        let name = job.name().to_string();
        let started_at = Utc::now();

        let (outcome, attempts, last_error) = if !self.window.allows(scheduled_for) {
            info!("Skipping {} at {}: outside execution window", name, scheduled_for);
            (DispatchOutcome::OutsideWindow, 0, None)
        } else if let Some(_permit) = self.guard.try_acquire(&name) {
            self.run_with_retry(job).await
        } else {
            warn!("Skipping {}: previous run still in progress", name);
            (DispatchOutcome::AlreadyRunning, 0, None)
        };

        self.history
            .record(JobEvent {
                run_id: Uuid::new_v4(),
                job: name,
                scheduled_for,
                started_at,
                finished_at: Utc::now(),
                outcome,
                attempts,
                error: last_error,
            })
            .await;

        outcome
    }

    async fn run_with_retry(&self, job: &dyn Job) -> (DispatchOutcome, u32, Option<String>) {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match job.run().await {
                Ok(()) => {
                    info!("Job {} completed (attempt {}/{})", job.name(), attempt, max_attempts);
                    return (DispatchOutcome::Completed, attempt, None);
                }
                Err(e) => {
                    error!("Job {} failed (attempt {}/{}): {}", job.name(), attempt, max_attempts, e);
                    last_error = Some(e.to_string());
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        error!("Job {} gave up after {} attempts", job.name(), max_attempts);
        (DispatchOutcome::Failed, max_attempts, last_error)
    }

    /// Spawn one timer loop per registered job.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let jobs: Vec<(Arc<dyn Job>, Schedule)> = match self.jobs.read() {
            Ok(jobs) => jobs.iter().map(|s| (Arc::clone(&s.job), s.schedule.clone())).collect(),
            Err(_) => Vec::new(),
        };

        jobs.into_iter()
            .map(|(job, schedule)| {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move { scheduler.run_loop(job, schedule).await })
            })
            .collect()
    }

    async fn run_loop(self: Arc<Self>, job: Arc<dyn Job>, schedule: Schedule) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut last_fired = None;

        loop {
            let now = Local::now().naive_local();
            let next = schedule.next_run(now, last_fired);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next run of {} at {} (in {}s)", job.name(), next, wait.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fired = Some(next);
                    let scheduler = Arc::clone(&self);
                    let job = Arc::clone(&job);
                    tokio::spawn(async move {
                        scheduler.dispatch(job.as_ref(), next).await;
                    });
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler loop for {} stopped", job.name());
                    break;
                }
            }
        }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        // 2025-03-03 is a Monday.
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    struct FlakyJob {
        failures: u32,
        calls: AtomicU32,
    }

    impl Job for FlakyJob {
        fn name(&self) -> &str {
            "flaky"
        }

        fn run(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if call <= self.failures {
                    Err(AppError::Internal(format!("failure {}", call)))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(&SchedulerConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_hourly_next_run() {
        let schedule = Schedule::HourlyAt { minute: 16 };
        assert_eq!(schedule.next_after(at(3, 9, 5)), at(3, 9, 16));
        assert_eq!(schedule.next_after(at(3, 9, 16)), at(3, 10, 16));
        assert_eq!(schedule.next_after(at(3, 23, 30)), at(4, 0, 16));
    }

    #[test]
    fn test_next_run_never_repeats_a_fired_slot() {
        let schedule = Schedule::HourlyAt { minute: 16 };
        assert_eq!(schedule.next_run(at(3, 9, 5), None), at(3, 9, 16));

        // Clock stepped back to 10:10 after the 10:16 slot fired
        assert_eq!(schedule.next_run(at(3, 10, 10), Some(at(3, 10, 16))), at(3, 11, 16));

        // Normal progression: woke just after the slot
        assert_eq!(schedule.next_run(at(3, 10, 16), Some(at(3, 10, 16))), at(3, 11, 16));

        // Clock jumped forward past several slots
        assert_eq!(schedule.next_run(at(3, 14, 20), Some(at(3, 10, 16))), at(3, 15, 16));
    }

    #[test]
    fn test_execution_window() {
        let window = ExecutionWindow::default();
        assert!(window.allows(at(3, 9, 16)));
        assert!(!window.allows(at(3, 0, 16)));
        assert!(!window.allows(at(8, 9, 16))); // Saturday
        assert!(!window.allows(at(9, 9, 16))); // Sunday
    }

    #[test]
    fn test_guard_exclusive() {
        let guard = JobGuard::new();
        let permit = guard.try_acquire("xau").unwrap();
        assert!(guard.try_acquire("xau").is_none());
        assert!(guard.try_acquire("other").is_some());
        drop(permit);
        assert!(!guard.is_running("xau"));
        assert!(guard.try_acquire("xau").is_some());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let scheduler = scheduler();
        let job = FlakyJob { failures: 2, calls: AtomicU32::new(0) };

        let outcome = scheduler.dispatch(&job, at(3, 9, 16)).await;
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(job.calls.load(Ordering::SeqCst), 3);

        let events = scheduler.history().recent(10).await;
        assert_eq!(events[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let scheduler = scheduler();
        let job = FlakyJob { failures: 10, calls: AtomicU32::new(0) };

        assert_eq!(scheduler.dispatch(&job, at(3, 9, 16)).await, DispatchOutcome::Failed);
        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
        let events = scheduler.history().recent(1).await;
        assert_eq!(events[0].error.as_deref(), Some("Internal error: failure 3"));
        assert!(!scheduler.guard().is_running("flaky"));
    }

    #[tokio::test]
    async fn test_skips_running_and_outside_window() {
        let scheduler = scheduler();
        let job = FlakyJob { failures: 0, calls: AtomicU32::new(0) };

        let _permit = scheduler.guard().try_acquire("flaky").unwrap();
        assert_eq!(scheduler.dispatch(&job, at(3, 9, 16)).await, DispatchOutcome::AlreadyRunning);
        assert_eq!(scheduler.dispatch(&job, at(8, 9, 16)).await, DispatchOutcome::OutsideWindow);
        assert_eq!(job.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let history = JobHistory::new(2);
        for minute in 0..3 {
            history
                .record(JobEvent {
                    run_id: Uuid::new_v4(),
                    job: "x".to_string(),
                    scheduled_for: at(3, 9, minute),
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                    outcome: DispatchOutcome::Completed,
                    attempts: 1,
                    error: None,
                })
                .await;
        }
        let recent = history.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].scheduled_for, at(3, 9, 2));
    }
}
