// src/race.rs

//! Trigger race: run every watcher concurrently, first fire wins.
//!
//! Guarantees:
//! - at most one winner per race;
//! - every watcher has finished (and released its child process or HTTP
//!   request) before [`race`] returns;
//! - fires that arrive after the winner are logged and dropped.

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{AgentLoopError, Result};
use crate::trigger::{Watch, WatchExit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceResult {
    Fired { index: usize, label: String },
    Cancelled,
}

pub async fn race(watchers: Vec<Box<dyn Watch>>, shutdown: &CancellationToken) -> Result<RaceResult> {
    if watchers.is_empty() {
        return Err(AgentLoopError::NoTriggers);
    }

    let token = shutdown.child_token();
    let mut set = JoinSet::new();
    let mut labels = Vec::with_capacity(watchers.len());

    for (index, watcher) in watchers.into_iter().enumerate() {
        labels.push(watcher.label().to_string());
        let cancel = token.clone();
        set.spawn(async move { (index, watcher.watch(cancel).await) });
    }
    debug!(watchers = labels.len(), "race started");

    let mut winner: Option<usize> = None;
    let mut aborted = 0usize;

    while let Some(joined) = set.join_next().await {
        let (index, exit) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "trigger watcher task failed");
                aborted += 1;
                continue;
            }
        };

        match exit {
            WatchExit::Fired if winner.is_none() => {
                info!(trigger = %labels[index], "race won");
                winner = Some(index);
                token.cancel();
            }
            WatchExit::Fired => {
                debug!(trigger = %labels[index], "late fire discarded");
            }
            WatchExit::Cancelled => {
                debug!(trigger = %labels[index], "watcher cancelled");
            }
            WatchExit::Aborted(reason) => {
                warn!(trigger = %labels[index], reason = %reason, "watcher gave up");
                aborted += 1;
            }
        }
    }

    match winner {
        Some(index) => Ok(RaceResult::Fired {
            index,
            label: labels.swap_remove(index),
        }),
        None if shutdown.is_cancelled() => Ok(RaceResult::Cancelled),
        None => {
            debug!(aborted, "race ended without a winner");
            Err(AgentLoopError::AllTriggersFailed)
        }
    }
}
