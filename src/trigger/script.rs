// src/trigger/script.rs

//! Script trigger: fires when a shell command exits with code 0.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::{Backoff, BackoffPolicy};
use crate::exec::shell::{describe_status, drain_output, kill_process_tree, shell_command};
use crate::trigger::TriggerOutcome;

#[derive(Debug)]
pub struct ScriptTrigger {
    label: String,
    command: String,
    workspace: PathBuf,
    backoff: Backoff,
}

impl ScriptTrigger {
    pub fn new(label: String, command: &str, workspace: PathBuf, backoff: BackoffPolicy) -> Self {
        Self {
            label,
            command: command.to_string(),
            workspace,
            backoff: Backoff::new(backoff),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the command once.
    ///
    /// `Err` means the shell itself can't be started and retrying is
    /// pointless; the watcher aborts.
    pub async fn attempt(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<TriggerOutcome, String> {
        let mut child = match shell_command(&self.command, &self.workspace).spawn() {
            Ok(child) => child,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Err(format!("cannot start shell for '{}': {e}", self.command));
            }
            Err(e) => return Ok(self.failed(format!("failed to spawn '{}': {e}", self.command))),
        };

        drain_output(&mut child, &self.label);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(trigger = %self.label, "cancelling script");
                kill_process_tree(&mut child, &self.label).await;
                Ok(TriggerOutcome::Cancelled)
            }
            status = child.wait() => match status {
                Ok(status) if status.success() => {
                    self.backoff.reset();
                    Ok(TriggerOutcome::Fired)
                }
                Ok(status) => Ok(self.failed(format!(
                    "'{}' finished with {}",
                    self.command,
                    describe_status(&status)
                ))),
                Err(e) => Ok(self.failed(format!("waiting for '{}': {e}", self.command))),
            },
        }
    }

    fn failed(&mut self, error: String) -> TriggerOutcome {
        let (attempt, retry_after) = self.backoff.next_delay();
        TriggerOutcome::Failed {
            error,
            attempt,
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn trigger(command: &str, dir: &std::path::Path) -> ScriptTrigger {
        ScriptTrigger::new(
            "script#0".to_string(),
            command,
            dir.to_path_buf(),
            BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn exit_zero_fires() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trigger("exit 0", dir.path());
        let outcome = t.attempt(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Fired);
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_growing_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trigger("exit 3", dir.path());
        let cancel = CancellationToken::new();

        let first = t.attempt(&cancel).await.unwrap();
        let second = t.attempt(&cancel).await.unwrap();
        match (first, second) {
            (
                TriggerOutcome::Failed { attempt: 1, retry_after: a, error },
                TriggerOutcome::Failed { attempt: 2, retry_after: b, .. },
            ) => {
                assert_eq!(a, Duration::from_secs(5));
                assert_eq!(b, Duration::from_secs(10));
                assert!(error.contains("exit code 3"), "{error}");
            }
            other => panic!("unexpected outcomes: {other:?}"),
        }
    }

    #[tokio::test]
    async fn runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let mut t = trigger("test -f marker", dir.path());
        let outcome = t.attempt(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, TriggerOutcome::Fired);
    }

    #[tokio::test]
    async fn missing_workspace_aborts() {
        let mut t = trigger("true", std::path::Path::new("/definitely/not/here"));
        assert!(t.attempt(&CancellationToken::new()).await.is_err());
    }
}
