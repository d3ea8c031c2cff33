// src/exec/runner.rs

//! Execution unit runner: reset handoff → launch → read handoff.

use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::Result;
use crate::exec::backend::{ExecutionBackend, ExecutionRequest, ExecutionStatus};
use crate::handoff::{HandoffChannel, HandoffRecord};
use crate::types::RunMode;

/// What happened during one execution-unit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub mode: RunMode,
    pub started_at: SystemTime,
    pub duration: Duration,
    pub status: ExecutionStatus,
    pub handoff: Option<HandoffRecord>,
}

impl ExecutionRecord {
    /// Exit code as the process would report it; interrupted runs count as
    /// 130 like a shell would.
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code().unwrap_or(130)
    }
}

pub struct ExecutionUnitRunner<E> {
    backend: E,
    handoff: HandoffChannel,
}

impl<E: ExecutionBackend> ExecutionUnitRunner<E> {
    pub fn new(backend: E, handoff: HandoffChannel) -> Self {
        Self { backend, handoff }
    }

    /// Run one unit to completion (or interruption).
    ///
    /// `Err` only when the unit could not be started; a nonzero exit is a
    /// normal record.
    pub async fn run(
        &mut self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionRecord> {
        let mode = request.mode;
        let agent = request.agent.clone();

        self.handoff.reset()?;

        let started_at = SystemTime::now();
        let clock = Instant::now();
        let status = self.backend.launch(request, cancel).await?;
        let duration = clock.elapsed();

        let handoff = match self.handoff.read_latest() {
            Ok(value) => value,
            Err(e) => {
                warn!(agent = %agent, error = %e, "could not read handoff file");
                None
            }
        };

        info!(
            agent = %agent,
            mode = %mode,
            status = ?status,
            duration = ?duration,
            handoff = handoff.as_ref().map(HandoffRecord::as_str).unwrap_or("-"),
            "execution unit finished"
        );

        Ok(ExecutionRecord {
            mode,
            started_at,
            duration,
            status,
            handoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::future::Future;
    use std::path::PathBuf;
    use std::pin::Pin;
    use std::sync::Arc;

    /// Writes a fixed id to the handoff file and exits with `code`.
    struct WritingBackend {
        handoff: HandoffChannel,
        write: Option<&'static str>,
        code: i32,
    }

    impl ExecutionBackend for WritingBackend {
        fn launch(
            &mut self,
            _request: ExecutionRequest,
            _cancel: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<ExecutionStatus>> + Send + '_>> {
            Box::pin(async move {
                if let Some(value) = self.write {
                    self.handoff.write(value)?;
                }
                Ok(ExecutionStatus::Exited(self.code))
            })
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            agent: "notes".to_string(),
            mode: RunMode::Triggered,
            workspace: PathBuf::from("/work"),
            prompt: "go".to_string(),
            model: None,
            env: Default::default(),
            init: Vec::new(),
            handoff_file: PathBuf::from("/state/agents/notes-trigger-handoff"),
        }
    }

    fn runner(fs: &MockFileSystem, write: Option<&'static str>, code: i32) -> ExecutionUnitRunner<WritingBackend> {
        let channel = HandoffChannel::new("/state/agents/notes-trigger-handoff", Arc::new(fs.clone()));
        let backend = WritingBackend {
            handoff: channel.clone(),
            write,
            code,
        };
        ExecutionUnitRunner::new(backend, channel)
    }

    #[tokio::test]
    async fn reads_back_what_the_unit_wrote() {
        let fs = MockFileSystem::new();
        let mut r = runner(&fs, Some("session-42"), 0);

        let record = r.run(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Exited(0));
        assert_eq!(record.handoff.unwrap().as_str(), "session-42");
    }

    #[tokio::test]
    async fn stale_value_is_not_reported_for_a_silent_run() {
        let fs = MockFileSystem::new();
        fs.add_file("/state/agents/notes-trigger-handoff", "old-session\n");
        let mut r = runner(&fs, None, 2);

        let record = r.run(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(record.exit_code(), 2);
        assert_eq!(record.handoff, None);
    }

    #[tokio::test]
    async fn unreadable_handoff_is_treated_as_absent() {
        let fs = MockFileSystem::new();
        fs.fail_reads_of("/state/agents/notes-trigger-handoff");
        let mut r = runner(&fs, Some("x"), 0);

        let record = r.run(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(record.handoff, None);
    }
}
