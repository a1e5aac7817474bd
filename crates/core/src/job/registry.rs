//! Job registry: owns every job and serializes operations per key.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

use super::controller::{self, transition};
use super::error::JobError;
use super::key::JobKey;
use super::supervisor::Supervisor;
use super::types::{
    Job, JobStatus, JobSummary, PauseOutcome, ProcessHandle, StartAck, StartRequest, Termination,
};
use crate::config::DownloaderConfig;
use crate::events::{EventBus, Listener, Subscription};
use crate::launcher::{DownloadEngine, Invocation, LaunchMode};
use crate::metrics::{JOBS_STARTED, JOB_OUTCOMES, PAUSE_REQUESTS};
use crate::progress::{ProgressParser, ProgressRecord};

/// One registry entry.
pub(crate) struct JobSlot {
    /// Serializes start/pause/resume for this key. Never held by the supervisor.
    ops: Arc<tokio::sync::Mutex<()>>,
    /// Job state. Held only briefly and never across an await; when both
    /// are needed it is taken before an event-bus topic lock.
    pub job: Mutex<Job>,
}

/// Process-wide map from job key to job.
///
/// Operations on the same key never interleave; operations on distinct keys
/// run fully concurrently.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobKey, Arc<JobSlot>>>,
    bus: EventBus,
    engine: Arc<dyn DownloadEngine>,
    config: DownloaderConfig,
}

impl JobRegistry {
    pub fn new(engine: Arc<dyn DownloadEngine>, config: DownloaderConfig) -> Self {
        Self::with_bus(engine, config, EventBus::new())
    }

    pub fn with_bus(engine: Arc<dyn DownloadEngine>, config: DownloaderConfig, bus: EventBus) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            bus,
            engine,
            config,
        }
    }

    /// The bus progress records are published on.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Starts, restarts or resumes the job for `request.identifier`.
    ///
    /// Returns once the process is spawned (or failed to spawn), not when it
    /// completes. A spawn failure is published as an `error` record; only
    /// malformed input is returned as an error.
    pub async fn start(&self, request: StartRequest) -> Result<StartAck, JobError> {
        let key = JobKey::parse(&request.identifier)?;
        let supplied = request.options()?;
        let identifier = request.identifier.trim().to_string();

        let slot = self.slot_or_insert(&key, &identifier);
        let _op = slot.ops.lock().await;

        let (mode, previous) = {
            let mut job = slot.job.lock();
            let mode = match job.status {
                JobStatus::Paused => LaunchMode::Resume,
                JobStatus::Running | JobStatus::Pausing => LaunchMode::Restart,
                _ => LaunchMode::Fresh,
            };
            if let Some(options) = supplied {
                job.options = options;
            }
            job.identifier = identifier.clone();

            let previous = match job.process.as_mut() {
                Some(handle) if mode == LaunchMode::Restart => {
                    // An already exited instance keeps its observed outcome.
                    if !handle.reaped {
                        handle.termination = Some(Termination::Supersede);
                        controller::signal_terminate(handle);
                    }
                    Some((handle.exited.clone(), Arc::clone(&handle.kill)))
                }
                _ => None,
            };
            (mode, previous)
        };

        if let Some((exited, kill)) = previous {
            info!(key = %key, "Restarting: terminating previous instance");
            if !controller::await_exit(exited, kill, self.grace_period()).await {
                error!(key = %key, "Previous downloader did not exit, not restarting");
                self.fail(&slot, &key, "Previous download process did not exit".to_string());
                return Ok(StartAck {
                    key,
                    mode,
                    launched: false,
                });
            }
        }

        let (invocation, resume_percent) = {
            let job = slot.job.lock();
            let invocation = Invocation::for_job(&job.identifier, &job.options, &self.config, mode);
            let resume_percent = match mode {
                LaunchMode::Resume => job.last_progress.as_ref().map(|r| r.percent).unwrap_or(0.0),
                _ => 0.0,
            };
            (invocation, resume_percent)
        };

        let process = match self.engine.launch(&invocation).await {
            Ok(process) => process,
            Err(e) => {
                error!(key = %key, engine = self.engine.name(), error = %e, "Failed to launch downloader");
                JOB_OUTCOMES.with_label_values(&["launch_failure"]).inc();
                self.fail(&slot, &key, e.to_string());
                return Ok(StartAck {
                    key,
                    mode,
                    launched: false,
                });
            }
        };

        let kill = Arc::new(Notify::new());
        let (exited_tx, exited_rx) = watch::channel(false);
        let instance = {
            let mut job = slot.job.lock();
            job.instances += 1;
            let instance = job.instances;
            job.process = Some(ProcessHandle {
                instance,
                pid: process.child.id(),
                termination: None,
                reaped: false,
                kill: Arc::clone(&kill),
                exited: exited_rx,
            });
            transition(&mut job, JobStatus::Running);

            let record = match mode {
                LaunchMode::Resume => {
                    ProgressRecord::progress(resume_percent, None, None, "Resuming download...")
                }
                _ => ProgressRecord::progress(0.0, None, None, "Starting download..."),
            };
            job.last_progress = Some(record.clone());
            self.bus.publish(&key, record);
            instance
        };

        JOBS_STARTED.with_label_values(&[mode.as_str()]).inc();
        info!(key = %key, instance, mode = mode.as_str(), "Job started");

        let supervisor = Supervisor {
            slot: Arc::clone(&slot),
            key: key.clone(),
            bus: self.bus.clone(),
            instance,
            parser: ProgressParser::new(self.config.error_tail_chars)
                .with_initial_percent(resume_percent),
            kill,
            exited: exited_tx,
            chapters: invocation.chapters.clone(),
        };
        tokio::spawn(supervisor.run(process));

        Ok(StartAck {
            key,
            mode,
            launched: true,
        })
    }

    /// Asks the running process for `identifier` to stop so it can be resumed.
    ///
    /// Returns immediately after signalling; the `paused` record follows once
    /// the exit is observed. Unknown or idle jobs are a no-op.
    pub async fn request_pause(&self, identifier: &str) -> Result<PauseOutcome, JobError> {
        let key = JobKey::parse(identifier)?;
        let Some(slot) = self.slot(&key) else {
            info!(key = %key, "Pause requested for unknown job, nothing to pause");
            return Ok(PauseOutcome::NothingToPause);
        };

        let guard = Arc::clone(&slot.ops).lock_owned().await;
        let (exited, kill) = {
            let mut job = slot.job.lock();
            if job.status != JobStatus::Running {
                info!(key = %key, status = %job.status, "Nothing to pause");
                return Ok(PauseOutcome::NothingToPause);
            }
            let Some(handle) = job.process.as_mut() else {
                warn!(key = %key, "Running job without a process handle");
                return Ok(PauseOutcome::NothingToPause);
            };
            if handle.reaped {
                info!(key = %key, "Downloader already exited, nothing to pause");
                return Ok(PauseOutcome::NothingToPause);
            }
            handle.termination = Some(Termination::Pause);
            controller::signal_terminate(handle);
            let waiters = (handle.exited.clone(), Arc::clone(&handle.kill));
            transition(&mut job, JobStatus::Pausing);
            waiters
        };
        PAUSE_REQUESTS.inc();

        // Keeps other operations on this key out until the process is gone.
        let grace = self.grace_period();
        tokio::spawn(async move {
            let _guard = guard;
            if !controller::await_exit(exited, kill, grace).await {
                error!(key = %key, "Downloader did not exit after kill");
            }
        });

        Ok(PauseOutcome::Pausing)
    }

    /// Latest record for a job, kept through `paused` and terminal states.
    pub fn latest_snapshot(&self, key: &JobKey) -> Option<ProgressRecord> {
        self.slot(key)
            .and_then(|slot| slot.job.lock().last_progress.clone())
    }

    pub fn status(&self, key: &JobKey) -> Option<JobStatus> {
        self.slot(key).map(|slot| slot.job.lock().status)
    }

    pub fn get(&self, key: &JobKey) -> Option<JobSummary> {
        self.slot(key).map(|slot| slot.job.lock().summary())
    }

    /// All known jobs, most recently updated first.
    pub fn list(&self) -> Vec<JobSummary> {
        let slots: Vec<Arc<JobSlot>> = self.jobs.read().values().cloned().collect();
        let mut jobs: Vec<JobSummary> = slots.iter().map(|slot| slot.job.lock().summary()).collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs
    }

    /// Subscribes to a job's records and returns the current snapshot with it.
    pub fn subscribe(&self, key: &JobKey, listener: Listener) -> (Option<ProgressRecord>, Subscription) {
        self.bus.subscribe_with_snapshot(key, listener)
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.pause_grace_period_ms)
    }

    fn slot(&self, key: &JobKey) -> Option<Arc<JobSlot>> {
        self.jobs.read().get(key).cloned()
    }

    fn slot_or_insert(&self, key: &JobKey, identifier: &str) -> Arc<JobSlot> {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        let mut jobs = self.jobs.write();
        Arc::clone(jobs.entry(key.clone()).or_insert_with(|| {
            Arc::new(JobSlot {
                ops: Arc::new(tokio::sync::Mutex::new(())),
                job: Mutex::new(Job::new(key.clone(), identifier)),
            })
        }))
    }

    /// Marks the job failed without a running process and publishes the error.
    fn fail(&self, slot: &JobSlot, key: &JobKey, message: String) {
        let mut job = slot.job.lock();
        let percent = job.last_progress.as_ref().map(|r| r.percent).unwrap_or(0.0);
        transition(&mut job, JobStatus::Error);
        let record = ProgressRecord::error(percent, message);
        job.last_progress = Some(record.clone());
        self.bus.publish(key, record);
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.read().len())
            .field("engine", &self.engine.name())
            .finish()
    }
}
