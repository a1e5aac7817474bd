//! Per-process supervisor task.
//!
//! Owns the child for its whole lifetime: feeds output lines to the parser,
//! publishes records while the instance is current and running, and reports
//! the exit exactly once.

use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{watch, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::controller::transition;
use super::key::JobKey;
use super::registry::JobSlot;
use super::types::{JobStatus, Termination};
use crate::events::EventBus;
use crate::launcher::{ChapterSelection, EngineProcess, LineReceiver};
use crate::metrics::JOB_OUTCOMES;
use crate::progress::{OutputStream, ProcessExit, ProgressParser, RecordKind};

/// Upper bound on reading buffered output after the process exited.
///
/// A grandchild (e.g. ffmpeg) can keep the pipes open past the exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct Supervisor {
    pub slot: Arc<JobSlot>,
    pub key: JobKey,
    pub bus: EventBus,
    pub instance: u64,
    pub parser: ProgressParser,
    pub kill: Arc<Notify>,
    pub exited: watch::Sender<bool>,
    pub chapters: Option<ChapterSelection>,
}

impl Supervisor {
    pub async fn run(mut self, process: EngineProcess) {
        let EngineProcess {
            mut child,
            mut lines,
            ..
        } = process;

        let exit = self.wait_for_exit(&mut child, &mut lines).await;
        let Some(termination) = self.mark_reaped() else {
            // replaced while running; a newer instance owns the job now
            self.exited.send_replace(true);
            return;
        };
        self.drain(&mut lines).await;
        self.finish(exit, termination).await;

        // Wakes pause/restart waiters; nobody listening is fine.
        self.exited.send_replace(true);
    }

    async fn wait_for_exit(&mut self, child: &mut Child, lines: &mut LineReceiver) -> (bool, Option<i32>) {
        let mut lines_open = true;
        loop {
            tokio::select! {
                line = lines.recv(), if lines_open => match line {
                    Some((stream, text)) => self.handle_line(stream, &text),
                    None => lines_open = false,
                },
                status = child.wait() => {
                    return match status {
                        Ok(status) => (status.success(), status.code()),
                        Err(e) => {
                            warn!(key = %self.key, error = %e, "Failed to wait for downloader");
                            (false, None)
                        }
                    };
                }
                _ = self.kill.notified() => {
                    if let Err(e) = child.start_kill() {
                        debug!(key = %self.key, error = %e, "Kill failed, process likely gone");
                    }
                }
            }
        }
    }

    /// Records the exit under the job lock and returns the termination that
    /// was requested before it, or `None` if this instance is no longer
    /// current. Requests arriving later no longer affect the outcome.
    fn mark_reaped(&self) -> Option<Option<Termination>> {
        let mut job = self.slot.job.lock();
        let handle = job
            .process
            .as_mut()
            .filter(|p| p.instance == self.instance)?;
        handle.reaped = true;
        handle.pid = None;
        Some(handle.termination)
    }

    async fn drain(&mut self, lines: &mut LineReceiver) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while let Ok(Some((stream, text))) = timeout_at(deadline, lines.recv()).await {
            self.handle_line(stream, &text);
        }
    }

    fn handle_line(&mut self, stream: OutputStream, text: &str) {
        let Some(record) = self.parser.parse_line(stream, text) else {
            return;
        };

        let mut job = self.slot.job.lock();
        let live = job
            .process
            .as_ref()
            .is_some_and(|p| p.instance == self.instance && p.termination.is_none());
        if !live || job.status != JobStatus::Running {
            // dying instance (pausing or superseded): keep the snapshot stable
            debug!(key = %self.key, instance = self.instance, "Discarding late progress");
            return;
        }
        job.last_progress = Some(record.clone());
        job.touch();
        self.bus.publish(&self.key, record);
    }

    async fn finish(&mut self, (success, code): (bool, Option<i32>), termination: Option<Termination>) {
        if termination == Some(Termination::Supersede) {
            let mut job = self.slot.job.lock();
            if job.process.as_ref().is_some_and(|p| p.instance == self.instance) {
                job.process = None;
            }
            debug!(key = %self.key, instance = self.instance, "Superseded instance exited");
            return;
        }

        if success && termination.is_none() {
            self.prune_chapters().await;
        }

        let mut job = self.slot.job.lock();
        if !job.process.as_ref().is_some_and(|p| p.instance == self.instance) {
            return;
        }

        let record = self.parser.finish(ProcessExit {
            success,
            code,
            pause_requested: termination == Some(Termination::Pause),
        });
        let status = match record.kind {
            RecordKind::Paused => JobStatus::Paused,
            RecordKind::Done => JobStatus::Done,
            _ => JobStatus::Error,
        };

        job.process = None;
        transition(&mut job, status);
        job.last_progress = Some(record.clone());
        JOB_OUTCOMES.with_label_values(&[record.kind.as_str()]).inc();

        match record.kind {
            RecordKind::Error => warn!(
                key = %self.key,
                code,
                message = record.message.as_deref().unwrap_or_default(),
                "Download failed"
            ),
            kind => info!(
                key = %self.key,
                instance = self.instance,
                outcome = kind.as_str(),
                "Downloader exited"
            ),
        }
        self.bus.publish(&self.key, record);
    }

    /// Removes chapter files the user did not select.
    async fn prune_chapters(&self) {
        let Some(selection) = &self.chapters else {
            return;
        };
        if selection.is_all() {
            return;
        }
        for file in self.parser.chapter_files() {
            if selection.keeps_section(file.number) {
                continue;
            }
            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => debug!(path = %file.path.display(), "Removed unselected chapter"),
                Err(e) => warn!(path = %file.path.display(), error = %e, "Failed to remove unselected chapter"),
            }
        }
    }
}
