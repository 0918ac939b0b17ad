//! In-process scheduler: one thread per job, fixed cadence plus on-demand triggers.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{JobsConfig, MAX_INTERVAL_SECS};
use crate::context::JobContext;
use crate::job::{Job, JobName, JobResult, JobResultExt, Outcome};

/// Upper bound on how long a loop sleeps before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Per-job counters, updated after every invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub runs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub last_outcome: Option<Outcome>,
    pub last_line: Option<String>,
    pub last_run_at: Option<DateTime<Local>>,
}

impl JobStats {
    fn record(&mut self, result: &JobResult) {
        let run = result.run();
        self.runs += 1;
        if result.is_ok() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.last_outcome = Some(run.outcome);
        self.last_line = Some(run.headline().to_string());
        self.last_run_at = Some(run.invoked_at);
    }
}

type SharedStats = Arc<Mutex<HashMap<JobName, JobStats>>>;

struct ScheduledJob {
    job: Arc<dyn Job>,
    every: Duration,
    run_on_start: bool,
}

/// Collects jobs and their cadence, then spawns them.
#[derive(Default)]
pub struct JobScheduler {
    jobs: Vec<ScheduledJob>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a job. `every` is clamped to between 1ms and
    /// [`MAX_INTERVAL_SECS`].
    pub fn schedule(mut self, job: Arc<dyn Job>, every: Duration, run_on_start: bool) -> Self {
        let name = job.name();
        self.jobs.retain(|scheduled| scheduled.job.name() != name);
        self.jobs.push(ScheduledJob {
            job,
            every: every.clamp(Duration::from_millis(1), Duration::from_secs(MAX_INTERVAL_SECS)),
            run_on_start,
        });
        self
    }

    /// Every enabled job from `config`, built against `context`.
    pub fn from_config(context: &JobContext, config: &JobsConfig) -> Self {
        JobName::ALL
            .into_iter()
            .map(|name| (name, config.get(name)))
            .filter(|(name, settings)| {
                if !settings.enabled {
                    info!(job = %name, "job disabled");
                }
                settings.enabled
            })
            .fold(Self::new(), |scheduler, (name, settings)| {
                scheduler.schedule(context.build_job(name, settings), settings.every(), settings.run_on_start)
            })
    }

    pub fn job_names(&self) -> Vec<JobName> {
        self.jobs.iter().map(|scheduled| scheduled.job.name()).collect()
    }

    /// Start one named thread per job.
    pub fn spawn(self) -> io::Result<SchedulerHandle> {
        let stats: SharedStats = Arc::default();
        let mut handle = SchedulerHandle {
            workers: HashMap::new(),
            stats: Arc::clone(&stats),
        };

        for scheduled in self.jobs {
            let name = scheduled.job.name();
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
            let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);
            let stats = Arc::clone(&stats);

            let spawned = thread::Builder::new()
                .name(format!("crm-job-{name}"))
                .spawn(move || job_loop(scheduled, shutdown_rx, trigger_rx, stats));

            let join = match spawned {
                Ok(join) => join,
                Err(e) => {
                    warn!(job = %name, error = %e, "failed to spawn job thread");
                    let _ = handle.shutdown();
                    return Err(e);
                }
            };

            handle.workers.insert(
                name,
                Worker {
                    shutdown: shutdown_tx,
                    trigger: trigger_tx,
                    join,
                },
            );
        }

        Ok(handle)
    }
}

struct Worker {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: thread::JoinHandle<()>,
}

/// Running scheduler (trigger, stats and shutdown hooks).
pub struct SchedulerHandle {
    workers: HashMap<JobName, Worker>,
    stats: SharedStats,
}

impl SchedulerHandle {
    /// Ask `job` to run as soon as possible.
    ///
    /// Triggers are coalesced: while a run is already pending this is a no-op. Returns
    /// `false` if the job is not scheduled.
    pub fn trigger(&self, job: JobName) -> bool {
        match self.workers.get(&job) {
            Some(worker) => {
                let _ = worker.trigger.try_send(());
                true
            }
            None => false,
        }
    }

    pub fn jobs(&self) -> Vec<JobName> {
        let mut names: Vec<JobName> = self.workers.keys().copied().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> HashMap<JobName, JobStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop every loop, waiting for in-flight runs to finish. Returns the final stats.
    pub fn shutdown(self) -> HashMap<JobName, JobStats> {
        for worker in self.workers.values() {
            let _ = worker.shutdown.send(());
        }

        for (name, worker) in self.workers {
            if worker.join.join().is_err() {
                warn!(job = %name, "job thread panicked");
            }
        }

        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.clone()
    }
}

fn job_loop(
    scheduled: ScheduledJob,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    stats: SharedStats,
) {
    let ScheduledJob {
        job,
        every,
        run_on_start,
    } = scheduled;
    let name = job.name();

    info!(job = %name, every_secs = every.as_secs(), run_on_start, "job loop started");

    let mut next_tick = Instant::now() + every;
    let mut pending = run_on_start;

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += every;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let wait = next_tick.saturating_duration_since(Instant::now()).min(POLL_INTERVAL);
            match trigger_rx.recv_timeout(wait) {
                Ok(()) => pending = true,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            continue;
        }

        pending = false;

        let result = job.run();
        debug!(job = %name, outcome = ?result.run().outcome, "scheduled run finished");

        stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .record(&result);
    }

    info!(job = %name, "job loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobError, JobFailure, JobRun};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Succeeds on odd invocations, fails on even ones.
    #[derive(Default)]
    struct CountingJob {
        calls: AtomicU64,
    }

    impl Job for CountingJob {
        fn name(&self) -> JobName {
            JobName::Heartbeat
        }

        fn run_at(&self, now: DateTime<Local>) -> JobResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let run = JobRun {
                job: self.name(),
                invoked_at: now,
                outcome: if call % 2 == 1 { Outcome::Success } else { Outcome::TransportError },
                lines: vec![format!("call {call}")],
            };

            if call % 2 == 1 {
                Ok(run)
            } else {
                Err(JobFailure {
                    run,
                    error: JobError::Malformed("even call".into()),
                })
            }
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn runs(handle: &SchedulerHandle) -> u64 {
        handle.stats().get(&JobName::Heartbeat).map_or(0, |s| s.runs)
    }

    #[test]
    fn run_on_start_runs_once_then_waits_for_the_cadence() {
        let job = Arc::new(CountingJob::default());
        let handle = JobScheduler::new()
            .schedule(job.clone(), Duration::from_secs(3600), true)
            .spawn()
            .unwrap();

        assert!(wait_until(|| runs(&handle) == 1));
        thread::sleep(Duration::from_millis(300));
        assert_eq!(runs(&handle), 1);

        handle.shutdown();
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn short_cadence_keeps_running_through_failures() {
        let handle = JobScheduler::new()
            .schedule(Arc::new(CountingJob::default()), Duration::from_millis(20), false)
            .spawn()
            .unwrap();

        assert!(wait_until(|| runs(&handle) >= 4));
        let stats = handle.shutdown();
        assert!(stats[&JobName::Heartbeat].failed >= 2);
    }

    #[test]
    fn stats_split_successes_and_failures() {
        let handle = JobScheduler::new()
            .schedule(Arc::new(CountingJob::default()), Duration::from_secs(3600), true)
            .spawn()
            .unwrap();

        assert!(wait_until(|| runs(&handle) == 1));
        assert!(handle.trigger(JobName::Heartbeat));
        assert!(wait_until(|| runs(&handle) == 2));

        let stats = handle.stats().remove(&JobName::Heartbeat).unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.last_outcome, Some(Outcome::TransportError));
        assert_eq!(stats.last_line.as_deref(), Some("call 2"));

        handle.shutdown();
    }

    #[test]
    fn trigger_runs_immediately_and_unknown_jobs_are_rejected() {
        let handle = JobScheduler::new()
            .schedule(Arc::new(CountingJob::default()), Duration::from_secs(3600), false)
            .spawn()
            .unwrap();

        assert_eq!(handle.jobs(), vec![JobName::Heartbeat]);
        assert!(!handle.trigger(JobName::Report));

        assert!(handle.trigger(JobName::Heartbeat));
        assert!(wait_until(|| runs(&handle) == 1));

        handle.shutdown();
    }

    #[test]
    fn oversized_cadence_is_clamped_and_the_loop_still_runs() {
        let handle = JobScheduler::new()
            .schedule(Arc::new(CountingJob::default()), Duration::MAX, true)
            .spawn()
            .unwrap();

        assert!(wait_until(|| runs(&handle) == 1));
        assert!(handle.trigger(JobName::Heartbeat));
        assert!(wait_until(|| runs(&handle) == 2));

        let stats = handle.shutdown();
        assert_eq!(stats[&JobName::Heartbeat].runs, 2);
    }

    #[test]
    fn rescheduling_a_job_replaces_it() {
        let scheduler = JobScheduler::new()
            .schedule(Arc::new(CountingJob::default()), Duration::from_secs(10), false)
            .schedule(Arc::new(CountingJob::default()), Duration::from_secs(20), false);

        assert_eq!(scheduler.job_names(), vec![JobName::Heartbeat]);
    }
}
