use crate::models::{SweepKind, TrackerSettings};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::{Mutex, Notify};
use tokio::time::Duration;

/// Wall-clock schedule, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl Schedule {
    /// First fire time strictly after `now`.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Daily { hour, minute } => {
                let candidate = at_time(now, 0, hour, minute);
                if candidate <= now {
                    candidate + ChronoDuration::days(1)
                } else {
                    candidate
                }
            }
            Schedule::Weekly { weekday, hour, minute } => {
                let days_ahead = (i64::from(weekday.num_days_from_monday())
                    - i64::from(now.weekday().num_days_from_monday()))
                .rem_euclid(7);
                let candidate = at_time(now, days_ahead, hour, minute);
                if candidate <= now {
                    candidate + ChronoDuration::days(7)
                } else {
                    candidate
                }
            }
        }
    }
}

fn at_time(now: DateTime<Utc>, days_ahead: i64, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN);
    (now.date_naive() + ChronoDuration::days(days_ahead))
        .and_time(time)
        .and_utc()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepJob {
    pub kind: SweepKind,
    pub schedule: Schedule,
}

impl SweepJob {
    pub fn from_settings(settings: &TrackerSettings) -> Vec<SweepJob> {
        vec![
            SweepJob {
                kind: SweepKind::DailyReminder,
                schedule: Schedule::Daily {
                    hour: settings.daily_reminder.hour,
                    minute: settings.daily_reminder.minute,
                },
            },
            SweepJob {
                kind: SweepKind::WeeklyDigest,
                schedule: Schedule::Weekly {
                    weekday: settings.weekly_report.weekday,
                    hour: settings.weekly_report.hour,
                    minute: settings.weekly_report.minute,
                },
            },
        ]
    }
}

type ExecutorFuture = Pin<Box<dyn Future<Output = bool> + Send>>;
/// Runs one sweep; resolves to `true` when the sweep failed as a whole.
pub type Executor = Arc<dyn Fn(SweepKind) -> ExecutorFuture + Send + Sync>;

/// Process-wide registry of notification sweeps with an explicit lifecycle.
#[derive(Clone)]
pub struct SweepScheduler {
    jobs: Arc<Mutex<Vec<SweepJob>>>,
    notify: Arc<Notify>,
    executor: Arc<RwLock<Option<Executor>>>,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl SweepScheduler {
    pub fn new(jobs: Vec<SweepJob>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(jobs)),
            notify: Arc::new(Notify::new()),
            executor: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_executor(&self, executor: Executor) {
        let mut writer = self
            .executor
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *writer = Some(executor);
    }

    /// Replaces the registered jobs and wakes the loop to recompute its next deadline.
    pub async fn set_jobs(&self, jobs: Vec<SweepJob>) {
        *self.jobs.lock().await = jobs;
        self.notify.notify_one();
    }

    pub async fn jobs(&self) -> Vec<SweepJob> {
        self.jobs.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns false when the loop was already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop(generation).await;
        });
        true
    }

    /// Retires the current loop. A loop from an earlier `start` never resumes.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.generation.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_waiters();
            self.notify.notify_one();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Option<(SweepKind, DateTime<Utc>)> {
        let jobs = self.jobs.lock().await;
        jobs.iter()
            .map(|job| (job.kind, job.schedule.next_fire_after(now)))
            .min_by_key(|(_, at)| *at)
    }

    async fn run_loop(self, generation: u64) {
        tracing::info!(generation, "sweep scheduler started");
        while self.is_current(generation) {
            let now = Utc::now();
            let Some((kind, at)) = self.next_due(now).await else {
                self.notify.notified().await;
                continue;
            };
            let delay = Duration::from_millis(at.signed_duration_since(now).num_milliseconds().max(0) as u64);
            tracing::debug!(sweep = kind.as_str(), at = %at, "next sweep scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if !self.is_current(generation) {
                        break;
                    }
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        if scheduler.execute(kind).await {
                            tracing::warn!(sweep = kind.as_str(), "sweep finished in failed state");
                        }
                    });
                }
                _ = self.notify.notified() => {}
            }
        }
        tracing::info!(generation, "sweep scheduler stopped");
    }

    async fn execute(&self, kind: SweepKind) -> bool {
        let executor = self
            .executor
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match executor {
            Some(executor) => executor(kind).await,
            None => true,
        }
    }
}
