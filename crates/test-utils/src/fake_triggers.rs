use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentloop::trigger::{TriggerSource, Watch, WatchExit};
use tokio_util::sync::CancellationToken;

/// What a [`ScriptedWatch`] does once started.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Fire after the delay unless cancelled first.
    FireAfter(Duration),
    /// Fire after the delay even if cancelled in the meantime.
    FireIgnoringCancel(Duration),
    /// Wait for cancellation.
    Never,
    /// Give up after the delay.
    AbortAfter(Duration, String),
}

/// Counters shared by every watcher of a [`FakeTriggerSource`].
#[derive(Debug, Clone, Default)]
pub struct WatchStats {
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl WatchStats {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A watcher whose outcome is fixed up front.
pub struct ScriptedWatch {
    label: String,
    behaviour: Behaviour,
    stats: WatchStats,
}

impl ScriptedWatch {
    pub fn new(label: &str, behaviour: Behaviour, stats: WatchStats) -> Self {
        Self {
            label: label.to_string(),
            behaviour,
            stats,
        }
    }

    pub fn boxed(label: &str, behaviour: Behaviour, stats: &WatchStats) -> Box<dyn Watch> {
        Box::new(Self::new(label, behaviour, stats.clone()))
    }
}

impl Watch for ScriptedWatch {
    fn label(&self) -> &str {
        &self.label
    }

    fn watch(
        self: Box<Self>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = WatchExit> + Send>> {
        let ScriptedWatch {
            behaviour, stats, ..
        } = *self;

        Box::pin(async move {
            stats.started.fetch_add(1, Ordering::SeqCst);

            let exit = match behaviour {
                Behaviour::FireAfter(delay) => tokio::select! {
                    _ = cancel.cancelled() => WatchExit::Cancelled,
                    _ = tokio::time::sleep(delay) => WatchExit::Fired,
                },
                Behaviour::FireIgnoringCancel(delay) => {
                    tokio::time::sleep(delay).await;
                    WatchExit::Fired
                }
                Behaviour::Never => {
                    cancel.cancelled().await;
                    WatchExit::Cancelled
                }
                Behaviour::AbortAfter(delay, reason) => tokio::select! {
                    _ = cancel.cancelled() => WatchExit::Cancelled,
                    _ = tokio::time::sleep(delay) => WatchExit::Aborted(reason),
                },
            };

            if exit == WatchExit::Cancelled {
                stats.cancelled.fetch_add(1, Ordering::SeqCst);
            }
            stats.finished.fetch_add(1, Ordering::SeqCst);
            exit
        })
    }
}

/// Trigger source that hands out the same scripted watchers for every race.
#[derive(Debug, Clone)]
pub struct FakeTriggerSource {
    behaviours: Vec<(String, Behaviour)>,
    stats: WatchStats,
    races: Arc<AtomicUsize>,
}

impl FakeTriggerSource {
    pub fn new(behaviours: Vec<(&str, Behaviour)>) -> Self {
        Self {
            behaviours: behaviours
                .into_iter()
                .map(|(label, b)| (label.to_string(), b))
                .collect(),
            stats: WatchStats::default(),
            races: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A single watcher that fires right away.
    pub fn immediate() -> Self {
        Self::new(vec![("fake#0", Behaviour::FireAfter(Duration::ZERO))])
    }

    pub fn stats(&self) -> WatchStats {
        self.stats.clone()
    }

    pub fn races(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.races)
    }
}

impl TriggerSource for FakeTriggerSource {
    fn instantiate(&self) -> Vec<Box<dyn Watch>> {
        self.races.fetch_add(1, Ordering::SeqCst);
        self.behaviours
            .iter()
            .map(|(label, b)| ScriptedWatch::boxed(label, b.clone(), &self.stats))
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }
}
