//! Job data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use super::error::JobError;
use super::key::JobKey;
use crate::launcher::LaunchMode;
use crate::progress::ProgressRecord;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Pausing,
    Paused,
    Done,
    Error,
}

impl JobStatus {
    /// Whether a process instance is alive in this status.
    pub fn has_process(self) -> bool {
        matches!(self, Self::Running | Self::Pausing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Pausing => "pausing",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options snapshot taken when a job is started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Format selector for video jobs. `None` means the configured default.
    pub quality: Option<String>,
    pub audio_only: bool,
    pub split_chapters: bool,
    /// Zero-based chapter positions to keep when splitting. Empty means all.
    pub selected_chapters: BTreeSet<u32>,
    /// Output directory. `None` means the configured default.
    pub output_dir: Option<PathBuf>,
}

/// A start (or resume) request as received from a client.
///
/// Every option is optional: when none is supplied, a known job keeps the
/// options it was started with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(alias = "url")]
    pub identifier: String,
    #[serde(default, alias = "quality")]
    pub quality_selector: Option<String>,
    #[serde(default, alias = "audio_only")]
    pub audio_only: Option<bool>,
    #[serde(default, alias = "split", alias = "split_chapters")]
    pub split_chapters: Option<bool>,
    #[serde(default, alias = "selectedChapters", alias = "selected_chapters")]
    pub selected_chapter_indices: Option<Vec<u32>>,
    #[serde(default, alias = "outdir", alias = "output_dir")]
    pub output_directory: Option<String>,
}

impl StartRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn audio_only(mut self) -> Self {
        self.audio_only = Some(true);
        self
    }

    pub fn with_quality(mut self, selector: impl Into<String>) -> Self {
        self.quality_selector = Some(selector.into());
        self
    }

    pub fn split_chapters(mut self, selected: impl IntoIterator<Item = u32>) -> Self {
        self.split_chapters = Some(true);
        self.selected_chapter_indices = Some(selected.into_iter().collect());
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_directory = Some(dir.into());
        self
    }

    /// Whether the request carries any option at all.
    pub fn has_options(&self) -> bool {
        self.quality_selector.is_some()
            || self.audio_only.is_some()
            || self.split_chapters.is_some()
            || self.selected_chapter_indices.is_some()
            || self.output_directory.is_some()
    }

    /// Builds the options snapshot, or `None` when the request supplies none.
    pub fn options(&self) -> Result<Option<JobOptions>, JobError> {
        if !self.has_options() {
            return Ok(None);
        }

        let quality = match self.quality_selector.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(q) => {
                if q.chars().any(char::is_control) {
                    return Err(JobError::invalid_input(
                        "quality selector contains control characters",
                    ));
                }
                Some(q.to_string())
            }
        };

        let output_dir = match self.output_directory.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(dir) => {
                if dir.contains('\0') {
                    return Err(JobError::invalid_input("output directory contains NUL"));
                }
                Some(PathBuf::from(dir))
            }
        };

        Ok(Some(JobOptions {
            quality,
            audio_only: self.audio_only.unwrap_or(false),
            split_chapters: self.split_chapters.unwrap_or(false),
            selected_chapters: self
                .selected_chapter_indices
                .iter()
                .flatten()
                .copied()
                .collect(),
            output_dir,
        }))
    }
}

/// Why the registry asked a process instance to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// User pause: the exit is reported as `paused`.
    Pause,
    /// Replaced by a restart: the exit is not reported at all.
    Supersede,
}

/// Registry-side handle on a live process instance.
///
/// The child itself is owned by its supervisor task; this handle is how the
/// registry signals it and observes its exit.
#[derive(Debug)]
pub(crate) struct ProcessHandle {
    pub instance: u64,
    /// Cleared once the exit is observed, so a reused pid is never signalled.
    pub pid: Option<u32>,
    pub termination: Option<Termination>,
    /// The process has exited; its supervisor is still draining output.
    pub reaped: bool,
    pub kill: Arc<Notify>,
    pub exited: watch::Receiver<bool>,
}

/// One logical download task.
#[derive(Debug)]
pub struct Job {
    pub key: JobKey,
    /// Identifier as last submitted, passed to the engine verbatim.
    pub identifier: String,
    pub status: JobStatus,
    pub options: JobOptions,
    pub last_progress: Option<ProgressRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of process instances launched so far.
    pub instances: u64,
    pub(crate) process: Option<ProcessHandle>,
}

impl Job {
    pub fn new(key: JobKey, identifier: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            identifier: identifier.into(),
            status: JobStatus::Idle,
            options: JobOptions::default(),
            last_progress: None,
            created_at: now,
            updated_at: now,
            instances: 0,
            process: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            key: self.key.clone(),
            identifier: self.identifier.clone(),
            status: self.status,
            options: self.options.clone(),
            progress: self.last_progress.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            instances: self.instances,
        }
    }
}

/// Read-only view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub key: JobKey,
    pub identifier: String,
    pub status: JobStatus,
    pub options: JobOptions,
    pub progress: Option<ProgressRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub instances: u64,
}

/// Acknowledgement returned by `start`: the job was initiated, not completed.
#[derive(Debug, Clone, Serialize)]
pub struct StartAck {
    pub key: JobKey,
    pub mode: LaunchMode,
    /// False when the process could not be spawned; an `error` record was published.
    pub launched: bool,
}

/// Result of a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseOutcome {
    /// A termination signal was sent; `paused` follows once the process exits.
    Pausing,
    /// No running process for this key.
    NothingToPause,
}
