//! Types shared by the parser, the event bus and the job registry.

use serde::{Deserialize, Serialize};

/// Kind of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Progress,
    Paused,
    Done,
    Error,
}

impl RecordKind {
    /// Whether this kind ends a process instance.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Progress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// A structured status update for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Completion in `[0, 100]`.
    pub percent: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub message: Option<String>,
}

impl ProgressRecord {
    pub fn progress(
        percent: f32,
        speed: Option<String>,
        eta: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::Progress,
            percent: clamp_percent(percent),
            speed,
            eta,
            message: Some(message.into()),
        }
    }

    pub fn paused(percent: f32) -> Self {
        Self {
            kind: RecordKind::Paused,
            percent: clamp_percent(percent),
            speed: None,
            eta: None,
            message: Some("Paused".to_string()),
        }
    }

    pub fn done() -> Self {
        Self {
            kind: RecordKind::Done,
            percent: 100.0,
            speed: None,
            eta: None,
            message: Some("Download complete".to_string()),
        }
    }

    pub fn error(percent: f32, message: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Error,
            percent: clamp_percent(percent),
            speed: None,
            eta: None,
            message: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

fn clamp_percent(percent: f32) -> f32 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}
