// src/exec/hooks.rs

//! Best-effort post-run hooks.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::exec::shell::{describe_status, drain_output, kill_process_tree, shell_command};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookReport {
    pub succeeded: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Run each hook in order in `workspace`. Failures are logged and skipped;
/// cancellation kills the running hook and stops the sequence.
pub async fn run_post_run_hooks(
    hooks: &[String],
    workspace: &Path,
    cancel: &CancellationToken,
) -> HookReport {
    let mut report = HookReport::default();

    for (index, hook) in hooks.iter().enumerate() {
        if cancel.is_cancelled() {
            report.interrupted = true;
            break;
        }

        let source = format!("post_run#{index}");
        debug!(hook = %source, cmd = %hook, "running post-run hook");

        let mut child = match shell_command(hook, workspace).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(hook = %source, cmd = %hook, error = %e, "failed to start post-run hook");
                report.failed += 1;
                continue;
            }
        };
        drain_output(&mut child, &source);

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => report.succeeded += 1,
                Ok(status) => {
                    warn!(
                        hook = %source,
                        cmd = %hook,
                        status = %describe_status(&status),
                        "post-run hook failed"
                    );
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(hook = %source, cmd = %hook, error = %e, "waiting for post-run hook");
                    report.failed += 1;
                }
            },
            _ = cancel.cancelled() => {
                info!(hook = %source, "interrupt received; killing post-run hook");
                kill_process_tree(&mut child, &source).await;
                report.interrupted = true;
                break;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_do_not_stop_later_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = vec![
            "exit 1".to_string(),
            "touch ran".to_string(),
        ];

        let report = run_post_run_hooks(&hooks, dir.path(), &CancellationToken::new()).await;
        assert_eq!(
            report,
            HookReport {
                succeeded: 1,
                failed: 1,
                interrupted: false
            }
        );
        assert!(dir.path().join("ran").exists());
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = run_post_run_hooks(&["touch ran".to_string()], dir.path(), &cancel).await;
        assert!(report.interrupted);
        assert_eq!(report.succeeded, 0);
        assert!(!dir.path().join("ran").exists());
    }
}
