//! Trait definitions for the launcher module.

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::mpsc;

use super::error::LaunchError;
use super::invocation::Invocation;
use crate::progress::OutputStream;

/// Output lines of a running process, tagged with the pipe they came from.
pub type LineReceiver = mpsc::Receiver<(OutputStream, String)>;

/// A freshly spawned downloader process.
#[derive(Debug)]
pub struct EngineProcess {
    pub child: Child,
    /// Lines from stdout and stderr, in arrival order. Closes when both pipes close.
    pub lines: LineReceiver,
    /// Arguments the process was started with.
    pub args: Vec<String>,
}

/// An external downloader: structured invocation in, line-oriented output out.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Translates an invocation into command-line arguments.
    fn build_args(&self, invocation: &Invocation) -> Vec<String>;

    /// Spawns exactly one process for the invocation.
    ///
    /// Failing to spawn is reported synchronously; nothing is left running.
    async fn launch(&self, invocation: &Invocation) -> Result<EngineProcess, LaunchError>;
}
