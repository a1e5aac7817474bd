//! Pause/resume controller: status transitions and process termination.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::types::{Job, JobStatus, ProcessHandle};
use crate::metrics::FORCED_KILLS;

/// How long to wait for exit after a forceful kill.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Whether `from -> to` is an edge of the job state machine.
///
/// `running -> running` and `pausing -> running` are restarts: the old
/// instance is terminated first, then a new one is spawned.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    matches!(
        (from, to),
        (Idle | Paused | Done | Error | Running | Pausing, Running)
            | (Running, Pausing | Done | Error)
            | (Pausing, Paused | Error)
            | (Idle | Paused | Done | Error, Error)
    )
}

/// Applies a status transition, refusing edges outside the state machine.
pub(crate) fn transition(job: &mut Job, to: JobStatus) -> bool {
    let from = job.status;
    if !can_transition(from, to) {
        warn!(key = %job.key, %from, %to, "Refusing invalid job transition");
        return false;
    }
    if from != to {
        info!(key = %job.key, %from, %to, "Job status changed");
    }
    job.status = to;
    job.touch();
    true
}

/// Asks a process instance to exit gracefully.
///
/// Sends SIGTERM where supported; elsewhere the supervisor kills the child
/// directly.
pub(crate) fn signal_terminate(handle: &ProcessHandle) {
    if handle.reaped {
        return;
    }
    if !send_sigterm(handle) {
        handle.kill.notify_one();
    }
}

#[cfg(unix)]
fn send_sigterm(handle: &ProcessHandle) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = handle.pid else {
        return false;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => debug!(pid, instance = handle.instance, "Sent SIGTERM"),
        // Already gone; the supervisor will observe the exit.
        Err(e) => debug!(pid, error = %e, "SIGTERM not delivered"),
    }
    true
}

#[cfg(not(unix))]
fn send_sigterm(_handle: &ProcessHandle) -> bool {
    false
}

/// Waits for a signalled process to exit, escalating to a forceful kill once
/// `grace` elapses. Returns false if the process still had not exited after
/// the kill.
pub(crate) async fn await_exit(
    mut exited: watch::Receiver<bool>,
    kill: Arc<Notify>,
    grace: Duration,
) -> bool {
    if wait_exited(&mut exited, grace).await {
        return true;
    }

    warn!(
        grace_ms = grace.as_millis() as u64,
        "Downloader ignored SIGTERM, killing it"
    );
    FORCED_KILLS.inc();
    kill.notify_one();
    wait_exited(&mut exited, KILL_WAIT).await
}

async fn wait_exited(exited: &mut watch::Receiver<bool>, limit: Duration) -> bool {
    // A closed channel means the supervisor is gone, so the process is too.
    timeout(limit, exited.wait_for(|done| *done)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKey;

    fn job(status: JobStatus) -> Job {
        let mut job = Job::new(JobKey::parse("abc123").unwrap(), "abc123");
        job.status = status;
        job
    }

    #[test]
    fn test_pause_cycle_edges() {
        use JobStatus::*;
        assert!(can_transition(Idle, Running));
        assert!(can_transition(Running, Pausing));
        assert!(can_transition(Pausing, Paused));
        assert!(can_transition(Paused, Running));
        assert!(can_transition(Running, Done));
        assert!(can_transition(Running, Error));
        assert!(can_transition(Done, Running));
    }

    #[test]
    fn test_pause_cannot_skip_termination() {
        use JobStatus::*;
        assert!(!can_transition(Running, Paused));
        assert!(!can_transition(Idle, Paused));
        assert!(!can_transition(Paused, Done));
        assert!(!can_transition(Pausing, Done));
        assert!(!can_transition(Done, Pausing));
    }

    #[test]
    fn test_transition_updates_job() {
        let mut j = job(JobStatus::Running);
        let before = j.updated_at;
        assert!(transition(&mut j, JobStatus::Pausing));
        assert_eq!(j.status, JobStatus::Pausing);
        assert!(j.updated_at >= before);

        assert!(!transition(&mut j, JobStatus::Done));
        assert_eq!(j.status, JobStatus::Pausing);
    }

    #[tokio::test]
    async fn test_await_exit_returns_once_exited() {
        let (tx, rx) = watch::channel(false);
        let kill = Arc::new(Notify::new());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send_replace(true);
        });
        assert!(await_exit(rx, kill, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_await_exit_escalates_after_grace() {
        let (tx, rx) = watch::channel(false);
        let kill = Arc::new(Notify::new());
        let killer = Arc::clone(&kill);
        tokio::spawn(async move {
            killer.notified().await;
            tx.send_replace(true);
        });
        assert!(await_exit(rx, kill, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_wait_is_pending_until_exit() {
        let (tx, mut rx) = watch::channel(false);
        let mut wait = tokio_test::task::spawn(wait_exited(&mut rx, Duration::from_secs(5)));
        tokio_test::assert_pending!(wait.poll());

        tx.send_replace(true);
        assert!(wait.is_woken());
        assert!(tokio_test::assert_ready!(wait.poll()));
    }

    #[tokio::test]
    async fn test_closed_channel_counts_as_exited() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        assert!(await_exit(rx, Arc::new(Notify::new()), Duration::from_millis(10)).await);
    }
}
