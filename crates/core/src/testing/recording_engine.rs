//! Engine wrapper that records invocations.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::launcher::{DownloadEngine, EngineProcess, Invocation, LaunchError};

/// Wraps a real engine and records every invocation it is asked to launch.
#[derive(Debug)]
pub struct RecordingEngine<E> {
    inner: E,
    invocations: Mutex<Vec<Invocation>>,
}

impl<E: DownloadEngine> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Invocations launched so far, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn last_invocation(&self) -> Option<Invocation> {
        self.invocations.lock().last().cloned()
    }
}

#[async_trait]
impl<E: DownloadEngine> DownloadEngine for RecordingEngine<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn build_args(&self, invocation: &Invocation) -> Vec<String> {
        self.inner.build_args(invocation)
    }

    async fn launch(&self, invocation: &Invocation) -> Result<EngineProcess, LaunchError> {
        self.invocations.lock().push(invocation.clone());
        self.inner.launch(invocation).await
    }
}
