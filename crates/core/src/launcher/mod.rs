//! Process launcher.
//!
//! Translates a job's options into a concrete downloader invocation and
//! spawns it, exposing the process output as tagged lines.

mod error;
mod invocation;
mod traits;
mod ytdlp;

pub use error::LaunchError;
pub use invocation::{ChapterSelection, Invocation, LaunchMode, MediaFormat};
pub use traits::{DownloadEngine, EngineProcess, LineReceiver};
pub use ytdlp::YtDlpEngine;
