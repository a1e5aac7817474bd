//! Download jobs.
//!
//! This module provides the job data model, the [`JobRegistry`] that owns
//! every job, and the pause/resume controller.
//!
//! # Lifecycle
//!
//! ```text
//! idle -> running -> pausing -> paused -> running ...
//!            |
//!            +-> done | error
//! ```
//!
//! `done` and `error` are terminal for a process instance; a new `start`
//! for the same key begins a fresh cycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use chaptergrab_core::job::{JobRegistry, StartRequest};
//! use chaptergrab_core::launcher::YtDlpEngine;
//!
//! let registry = JobRegistry::new(Arc::new(YtDlpEngine::default()), config.downloader);
//! let ack = registry.start(StartRequest::new("https://youtu.be/abc123").audio_only()).await?;
//! registry.request_pause("https://youtu.be/abc123").await?;
//! // later: same identifier, no options -> resumes with the stored ones
//! registry.start(StartRequest::new("https://youtu.be/abc123")).await?;
//! ```

mod controller;
mod error;
mod key;
mod registry;
mod supervisor;
mod types;

pub use controller::can_transition;
pub use error::JobError;
pub use key::JobKey;
pub use registry::JobRegistry;
pub use types::{Job, JobOptions, JobStatus, JobSummary, PauseOutcome, StartAck, StartRequest};
