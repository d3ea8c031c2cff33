use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agentloop::errors::Result;
use agentloop::exec::{ExecutionBackend, ExecutionRequest, ExecutionStatus};
use agentloop::types::RunMode;
use tokio_util::sync::CancellationToken;

/// Shared record of every request a [`FakeBackend`] was asked to launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchLog(Arc<Mutex<Vec<ExecutionRequest>>>);

impl LaunchLog {
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn modes(&self) -> Vec<RunMode> {
        self.0.lock().unwrap().iter().map(|r| r.mode).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fake execution backend that:
/// - records every launch request
/// - exits with scripted codes (0 once the script runs out)
/// - optionally writes `run-<n>` to the handoff file like a real unit would
/// - optionally blocks until cancelled, or raises shutdown after N launches
pub struct FakeBackend {
    log: LaunchLog,
    exit_codes: VecDeque<i32>,
    write_handoff: bool,
    hang: bool,
    shutdown_after: Option<(usize, CancellationToken)>,
}

impl FakeBackend {
    pub fn new() -> (Self, LaunchLog) {
        let log = LaunchLog::default();
        let backend = Self {
            log: log.clone(),
            exit_codes: VecDeque::new(),
            write_handoff: false,
            hang: false,
            shutdown_after: None,
        };
        (backend, log)
    }

    pub fn exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes = codes.into_iter().collect();
        self
    }

    pub fn writing_handoff(mut self) -> Self {
        self.write_handoff = true;
        self
    }

    /// Every launch waits for its cancellation token.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Cancel `token` once `launches` units have finished.
    pub fn shutdown_after(mut self, launches: usize, token: CancellationToken) -> Self {
        self.shutdown_after = Some((launches, token));
        self
    }
}

impl ExecutionBackend for FakeBackend {
    fn launch(
        &mut self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionStatus>> + Send + '_>> {
        Box::pin(async move {
            let launched = {
                let mut guard = self.log.0.lock().unwrap();
                guard.push(request.clone());
                guard.len()
            };

            if self.hang {
                cancel.cancelled().await;
                return Ok(ExecutionStatus::Interrupted);
            }

            if self.write_handoff {
                std::fs::write(&request.handoff_file, format!("run-{launched}\n"))
                    .map_err(anyhow::Error::from)?;
            }

            let code = self.exit_codes.pop_front().unwrap_or(0);

            if let Some((after, token)) = &self.shutdown_after {
                if launched >= *after {
                    token.cancel();
                }
            }

            Ok(ExecutionStatus::Exited(code))
        })
    }
}
