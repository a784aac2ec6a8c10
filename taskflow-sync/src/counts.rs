//! Count synchronizer: owns the app-wide `TaskCounts` aggregate.
//!
//! Two ways in, both wholesale replacements:
//! - pull: `refresh` fetches a snapshot from a `CountSource`
//! - push: `apply_snapshot` installs a snapshot delivered by the live channel
//!
//! Late responses may land after newer ones; since every write replaces the
//! whole aggregate the state is never a mix of two snapshots.

use chrono::NaiveDate;
use std::sync::Arc;
use taskflow_core::{CountSource, EventBus, EventKind, StoreError, SubscriptionId, TaskCounts};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountState {
    /// `None` until the first snapshot arrives.
    pub counts: Option<TaskCounts>,
    pub loading: bool,
}

impl Default for CountState {
    fn default() -> Self {
        Self { counts: None, loading: true }
    }
}

/// Invalidation signals produced by [`CountSynchronizer::attach`].
#[derive(Debug)]
pub struct Invalidations {
    rx: mpsc::UnboundedReceiver<EventKind>,
}

impl Invalidations {
    pub async fn next(&mut self) -> Option<EventKind> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for callers driving their own loop.
    pub fn try_next(&mut self) -> Option<EventKind> {
        self.rx.try_recv().ok()
    }
}

pub struct CountSynchronizer {
    source: Arc<dyn CountSource>,
    state: watch::Sender<CountState>,
}

impl CountSynchronizer {
    pub fn new(source: Arc<dyn CountSource>) -> Self {
        let (state, _) = watch::channel(CountState::default());
        Self { source, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<CountState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CountState {
        self.state.borrow().clone()
    }

    pub fn counts(&self) -> Option<TaskCounts> {
        self.state.borrow().counts.clone()
    }

    /// Pull a fresh snapshot for the caller's `today`. On failure the previous
    /// aggregate is kept and the error is returned.
    pub async fn refresh(&self, today: NaiveDate) -> Result<TaskCounts, StoreError> {
        match self.source.fetch_counts(today).await {
            Ok(counts) => {
                debug!(%today, "pulled task counts");
                self.replace(counts.clone());
                Ok(counts)
            }
            Err(e) => {
                warn!(%today, error = %e, "pulling task counts failed");
                self.state.send_modify(|s| s.loading = false);
                Err(e)
            }
        }
    }

    /// Install a pushed snapshot as-is.
    pub fn apply_snapshot(&self, counts: TaskCounts) {
        debug!("applying pushed task counts");
        self.replace(counts);
    }

    /// Register the bus's any-change hook; every task event yields one signal.
    pub fn attach(&self, bus: &EventBus) -> (SubscriptionId, Invalidations) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = bus.subscribe_any_change(move |kind| {
            // Receiver gone means nobody refreshes any more; nothing to do.
            let _ = tx.send(kind);
        });
        (id, Invalidations { rx })
    }

    /// Pull once per invalidation until the bus side is dropped.
    pub async fn run_invalidations<F>(&self, mut invalidations: Invalidations, today: F)
    where
        F: Fn() -> NaiveDate + Send,
    {
        while let Some(kind) = invalidations.next().await {
            debug!(?kind, "counts invalidated");
            // Failure already logged; the next event or push heals it.
            let _ = self.refresh(today()).await;
        }
    }

    fn replace(&self, counts: TaskCounts) {
        self.state.send_replace(CountState {
            counts: Some(counts),
            loading: false,
        });
    }
}
