//! Bounded subprocess execution.
//!
//! Every external tool invocation goes through [`run`], which owns the child
//! process for its whole lifetime. The child is killed when its time budget
//! runs out or, if a cancellation token is supplied, when the token fires.

use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reasons a bounded process run did not produce an exit status.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    #[error("failed while waiting for process: {0}")]
    Wait(std::io::Error),

    #[error("process timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("process aborted by cancellation")]
    Aborted,
}

/// Runs `cmd` to completion with captured stdout/stderr.
///
/// A non-zero exit status is not an error here; callers inspect
/// `Output::status` themselves.
pub async fn run(
    mut cmd: Command,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<Output, RunError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(cmd = ?cmd, timeout_secs = timeout.as_secs(), "Spawning process");

    let child = cmd.spawn().map_err(RunError::Spawn)?;

    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    // Dropping the pending wait drops the child, and kill_on_drop reaps it.
    tokio::select! {
        result = child.wait_with_output() => result.map_err(RunError::Wait),
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "Process exceeded its time budget, killing it");
            Err(RunError::TimedOut(timeout))
        }
        _ = cancelled => {
            warn!("Cancellation requested, killing in-flight process");
            Err(RunError::Aborted)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn captures_output_and_status() {
        let output = run(sh("echo out; echo err 1>&2; exit 3"), Duration::from_secs(5), None)
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn times_out_hung_process() {
        let result = run(sh("sleep 10"), Duration::from_millis(200), None).await;

        assert!(matches!(result, Err(RunError::TimedOut(_))));
    }

    #[tokio::test]
    async fn cancellation_aborts_process() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = run(sh("sleep 10"), Duration::from_secs(5), Some(&token)).await;

        assert!(matches!(result, Err(RunError::Aborted)));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let cmd = Command::new("/nonexistent/definitely-not-a-tool");
        let result = run(cmd, Duration::from_secs(1), None).await;

        assert!(matches!(result, Err(RunError::Spawn(_))));
    }
}
