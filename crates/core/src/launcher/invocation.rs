//! Structured description of one downloader run.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::DownloaderConfig;
use crate::job::JobOptions;

/// Why a process instance is being launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// First run, or a new cycle after `done`/`error`.
    Fresh,
    /// The previous instance was still running and has been terminated.
    Restart,
    /// The job was paused; bytes already on disk are reused.
    Resume,
}

impl LaunchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Restart => "restart",
            Self::Resume => "resume",
        }
    }

    /// Whether the engine should continue a partial download.
    pub fn continues_partial(self) -> bool {
        matches!(self, Self::Resume)
    }
}

/// What to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFormat {
    /// Extract audio into a compressed container.
    Audio { codec: String, quality: String },
    /// Download video with an opaque format selector.
    Video {
        selector: String,
        merge_format: String,
    },
}

/// Which chapters to keep when splitting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterSelection {
    /// Zero-based chapter positions; empty means all.
    indices: BTreeSet<u32>,
}

impl ChapterSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.indices.is_empty()
    }

    /// Selected zero-based positions, sorted and deduplicated.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    /// Whether the chapter with 1-based section number `number` is kept.
    pub fn keeps_section(&self, number: u32) -> bool {
        self.is_all() || (number > 0 && self.indices.contains(&(number - 1)))
    }
}

/// A complete, engine-agnostic description of one downloader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Source identifier exactly as the user submitted it (trimmed).
    pub identifier: String,
    pub output_dir: PathBuf,
    pub format: MediaFormat,
    /// `Some` when the output is split at chapter boundaries.
    pub chapters: Option<ChapterSelection>,
    /// Continue a previous partial download instead of starting over.
    pub continue_partial: bool,
    pub extra_args: Vec<String>,
}

impl Invocation {
    /// Builds the invocation for a job, filling unset options from config.
    pub fn for_job(
        identifier: &str,
        options: &JobOptions,
        config: &DownloaderConfig,
        mode: LaunchMode,
    ) -> Self {
        let format = if options.audio_only {
            MediaFormat::Audio {
                codec: config.audio_format.clone(),
                quality: config.audio_quality.clone(),
            }
        } else {
            MediaFormat::Video {
                selector: options
                    .quality
                    .clone()
                    .unwrap_or_else(|| config.default_quality.clone()),
                merge_format: config.merge_output_format.clone(),
            }
        };

        let chapters = options
            .split_chapters
            .then(|| ChapterSelection::only(options.selected_chapters.iter().copied()));

        Self {
            identifier: identifier.trim().to_string(),
            output_dir: options
                .output_dir
                .clone()
                .unwrap_or_else(|| config.output_dir.clone()),
            format,
            chapters,
            continue_partial: mode.continues_partial(),
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self.format, MediaFormat::Audio { .. })
    }
}
