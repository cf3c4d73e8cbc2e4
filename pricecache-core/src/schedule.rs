//! Process-wide scheduled-task runner.
//!
//! A [`TaskQueue`] holds named jobs with a cadence and a next-run time. A
//! single background thread ([`Scheduler`]) polls the queue every
//! `poll_interval` and runs whatever is due. Only one scheduler thread may
//! exist per process at a time.
//!
//! Jobs run synchronously on the scheduler thread. A panicking job is logged
//! and rescheduled; it never takes the loop down.

use crate::config::{Config, ConfigError};
use crate::data::cache::SymbolStore;
use crate::data::fetcher::Fetcher;
use crate::data::provider::PageSource;
use crate::data::sweep::{panic_message, refresh_all, LogProgress};
use chrono::{NaiveDateTime, NaiveTime};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Set while a scheduler thread is alive.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// Upper bound on a single sleep, so shutdown is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("a scheduler is already running in this process")]
    AlreadyRunning,

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(std::io::Error),

    #[error("invalid daily time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("scheduler thread panicked")]
    Panicked,
}

/// Parse an `HH:MM` (or `HH:MM:SS`) wall-clock time.
pub fn parse_daily_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))
}

/// When a job repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once a day at a local wall-clock time.
    DailyAt(NaiveTime),
    /// At a fixed interval after each run.
    Every(chrono::Duration),
}

impl Cadence {
    /// First run strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Cadence::DailyAt(at) => {
                let today = now.date().and_time(at);
                if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                }
            }
            Cadence::Every(interval) => now + interval,
        }
    }
}

type JobFn = Box<dyn FnMut() + Send>;

struct Job {
    name: String,
    cadence: Cadence,
    next_run: NaiveDateTime,
    run: JobFn,
}

/// Queue of recurring jobs, ordered by due time when run.
#[derive(Default)]
pub struct TaskQueue {
    jobs: Vec<Job>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; its first run is the cadence's next slot after `now`.
    pub fn add_job<F>(&mut self, name: impl Into<String>, cadence: Cadence, now: NaiveDateTime, job: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.jobs.push(Job {
            name: name.into(),
            cadence,
            next_run: cadence.next_after(now),
            run: Box::new(job),
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Earliest pending run, if any job is registered.
    pub fn next_run(&self) -> Option<NaiveDateTime> {
        self.jobs.iter().map(|j| j.next_run).min()
    }

    /// Names and next-run times, for display.
    pub fn upcoming(&self) -> Vec<(String, NaiveDateTime)> {
        let mut out: Vec<_> = self
            .jobs
            .iter()
            .map(|j| (j.name.clone(), j.next_run))
            .collect();
        out.sort_by_key(|(_, t)| *t);
        out
    }

    /// Run every job due at `now`, earliest first, and reschedule each one.
    ///
    /// Returns how many jobs ran.
    pub fn run_pending(&mut self, now: NaiveDateTime) -> usize {
        let mut due: Vec<usize> = (0..self.jobs.len())
            .filter(|&i| self.jobs[i].next_run <= now)
            .collect();
        due.sort_by_key(|&i| self.jobs[i].next_run);

        for &i in &due {
            let job = &mut self.jobs[i];
            info!(job = %job.name, "running scheduled job");
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| (job.run)()));
            if let Err(payload) = result {
                error!(
                    job = %job.name,
                    panic = %panic_message(payload.as_ref()),
                    "scheduled job panicked"
                );
            }
            job.next_run = job.cadence.next_after(now);
            info!(
                job = %job.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                next_run = %job.next_run,
                "scheduled job finished"
            );
        }

        due.len()
    }
}

/// Background runner for a [`TaskQueue`].
pub struct Scheduler;

impl Scheduler {
    /// Spawn the scheduler thread. Fails if one is already running.
    pub fn start(queue: TaskQueue, poll_interval: Duration) -> Result<SchedulerHandle, ScheduleError> {
        if RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScheduleError::AlreadyRunning);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        if let Some(next) = queue.next_run() {
            info!(jobs = queue.len(), next_run = %next, "scheduler starting");
        }

        let spawned = thread::Builder::new()
            .name("pricecache-scheduler".into())
            .spawn(move || scheduler_loop(queue, poll_interval, flag));

        match spawned {
            Ok(thread) => Ok(SchedulerHandle {
                shutdown,
                thread: Some(thread),
            }),
            Err(e) => {
                RUNNING.store(false, Ordering::SeqCst);
                Err(ScheduleError::Spawn(e))
            }
        }
    }

    /// Whether a scheduler thread is alive in this process.
    pub fn is_running() -> bool {
        RUNNING.load(Ordering::SeqCst)
    }
}

fn scheduler_loop(mut queue: TaskQueue, poll_interval: Duration, shutdown: Arc<AtomicBool>) -> TaskQueue {
    while !shutdown.load(Ordering::Relaxed) {
        queue.run_pending(chrono::Local::now().naive_local());

        let deadline = Instant::now() + poll_interval;
        while !shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
    info!("scheduler stopped");
    queue
}

/// Handle to the running scheduler thread.
///
/// Dropping the handle leaves the thread running until the process exits.
pub struct SchedulerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<TaskQueue>>,
}

impl SchedulerHandle {
    /// Stop the loop after the current job (if any) and wait for the thread.
    ///
    /// Returns the queue so it can be inspected or restarted.
    pub fn shutdown(mut self) -> Result<TaskQueue, ScheduleError> {
        self.shutdown.store(true, Ordering::Relaxed);
        self.join_inner()
    }

    /// Block until the scheduler stops (normally: never).
    pub fn join(mut self) -> Result<TaskQueue, ScheduleError> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<TaskQueue, ScheduleError> {
        let thread = self.thread.take().ok_or(ScheduleError::Panicked)?;
        let result = thread.join().map_err(|_| ScheduleError::Panicked);
        RUNNING.store(false, Ordering::SeqCst);
        result
    }
}

/// Queue holding the daily cache sweep.
pub fn daily_refresh_queue(
    config: &Config,
    fetcher: Arc<Fetcher<dyn PageSource>>,
    store: Arc<dyn SymbolStore>,
    now: NaiveDateTime,
) -> Result<TaskQueue, ConfigError> {
    let at = config.daily_time()?;
    let default_symbol = config.default_symbol.clone();
    let template = config.fetch_request(&default_symbol);

    let mut queue = TaskQueue::new();
    queue.add_job("daily-sweep", Cadence::DailyAt(at), now, move || {
        refresh_all(
            fetcher.as_ref(),
            store.as_ref(),
            &default_symbol,
            &template,
            &LogProgress,
        );
    });
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parses_hh_mm() {
        assert_eq!(
            parse_daily_time("17:00").unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap()
        );
        assert_eq!(
            parse_daily_time(" 08:05:30 ").unwrap(),
            NaiveTime::from_hms_opt(8, 5, 30).unwrap()
        );
        assert!(parse_daily_time("5pm").is_err());
        assert!(parse_daily_time("24:00").is_err());
    }

    #[test]
    fn daily_before_time_is_today() {
        let c = Cadence::DailyAt(NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(c.next_after(at(10, 9, 0)), at(10, 17, 0));
    }

    #[test]
    fn daily_at_or_after_time_is_tomorrow() {
        let c = Cadence::DailyAt(NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(c.next_after(at(10, 17, 0)), at(11, 17, 0));
        assert_eq!(c.next_after(at(10, 23, 59)), at(11, 17, 0));
    }

    #[test]
    fn every_adds_interval() {
        let c = Cadence::Every(chrono::Duration::minutes(30));
        assert_eq!(c.next_after(at(10, 9, 0)), at(10, 9, 30));
    }

    #[test]
    fn run_pending_only_runs_due_jobs() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut q = TaskQueue::new();
        q.add_job(
            "sweep",
            Cadence::DailyAt(NaiveTime::from_hms_opt(17, 0, 0).unwrap()),
            at(10, 9, 0),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(q.run_pending(at(10, 16, 59)), 0);
        assert_eq!(q.run_pending(at(10, 17, 0)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(q.next_run(), Some(at(11, 17, 0)));

        // Polling again the same evening does not rerun it.
        assert_eq!(q.run_pending(at(10, 17, 30)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missed_slot_runs_once_on_next_poll() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut q = TaskQueue::new();
        q.add_job(
            "sweep",
            Cadence::DailyAt(NaiveTime::from_hms_opt(17, 0, 0).unwrap()),
            at(10, 9, 0),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        // Process was asleep for two days.
        assert_eq!(q.run_pending(at(12, 18, 0)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(q.next_run(), Some(at(13, 17, 0)));
    }

    #[test]
    fn panicking_job_is_rescheduled() {
        let mut q = TaskQueue::new();
        q.add_job(
            "boom",
            Cadence::Every(chrono::Duration::minutes(1)),
            at(10, 9, 0),
            || panic!("job failed"),
        );
        assert_eq!(q.run_pending(at(10, 9, 1)), 1);
        assert_eq!(q.next_run(), Some(at(10, 9, 2)));
    }

    #[test]
    fn due_jobs_run_earliest_first() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut q = TaskQueue::new();
        let o1 = Arc::clone(&order);
        q.add_job(
            "late",
            Cadence::Every(chrono::Duration::minutes(10)),
            at(10, 9, 0),
            move || o1.lock().unwrap().push("late"),
        );
        let o2 = Arc::clone(&order);
        q.add_job(
            "early",
            Cadence::Every(chrono::Duration::minutes(5)),
            at(10, 9, 0),
            move || o2.lock().unwrap().push("early"),
        );
        assert_eq!(q.run_pending(at(10, 9, 20)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(q.upcoming()[0].1, at(10, 9, 25));
    }
}
