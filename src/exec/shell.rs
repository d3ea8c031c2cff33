// src/exec/shell.rs

//! Shell helpers shared by script triggers and post-run hooks.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Build a shell command appropriate for the platform, running in `cwd`.
///
/// On unix the child leads its own process group so that
/// [`kill_process_tree`] also reaches anything the shell spawned.
pub fn shell_command(cmd: &str, cwd: &Path) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    command
}

/// Forward the child's stdout/stderr to debug logs so pipes never fill up.
pub fn drain_output(child: &mut Child, source: &str) {
    if let Some(stdout) = child.stdout.take() {
        spawn_line_logger(stdout, source.to_string(), "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_logger(stderr, source.to_string(), "stderr");
    }
}

fn spawn_line_logger<R>(reader: R, source: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(source = %source, stream, "{}", line);
        }
    });
}

/// Kill the child (and, on unix, its whole process group) and reap it.
pub async fn kill_process_tree(child: &mut Child, source: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain syscall; a negative pid addresses the process group
        // created by `shell_command`.
        let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if rc != 0 {
            debug!(source = %source, pid, "process group already gone");
        }
    }

    if let Err(e) = child.kill().await {
        warn!(source = %source, error = %e, "failed to kill child process");
    }
}

/// `exit code 3` / `killed by signal` wording for logs.
pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}
