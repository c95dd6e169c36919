//! Async execution shell
//!
//! Runs one lifecycle operation at a time on a tokio task and delivers a
//! single completion notification. Starting a new operation first displaces
//! the active one: its notification is disconnected, then it gets a grace
//! period to finish before the task is aborted.

use crate::lifecycle::LifecycleEngine;
use crate::operation::{OperationKind, OperationOutcome, OperationRequest, OperationState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

/// Receives the terminal outcome of one operation
pub type CompletionCallback = Box<dyn FnOnce(OperationOutcome) + Send + 'static>;

/// What happened to the previously active operation when a slot was cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Displacement {
    /// No operation was active
    Idle,
    /// The previous operation had already finished
    Finished,
    /// The previous operation finished within the grace period
    Stopped,
    /// The previous operation was aborted after the grace period elapsed
    Terminated,
}

impl Displacement {
    /// Whether the slot was cleared without force
    pub fn within_grace(&self) -> bool {
        !matches!(self, Self::Terminated)
    }

    fn metric_label(&self) -> Option<&'static str> {
        match self {
            Self::Stopped => Some("stopped"),
            Self::Terminated => Some("terminated"),
            Self::Idle | Self::Finished => None,
        }
    }
}

type Notifier = Arc<std::sync::Mutex<Option<CompletionCallback>>>;

struct ActiveTask {
    kind: OperationKind,
    cancelled: Arc<AtomicBool>,
    notifier: Notifier,
    state: Arc<std::sync::Mutex<OperationState>>,
    handle: JoinHandle<()>,
}

impl ActiveTask {
    /// Drop the callback so nothing is delivered from this task any more
    ///
    /// Returns false when the worker already took the callback.
    fn disconnect(&self) -> bool {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notifier
            .lock()
            .map(|mut notifier| notifier.take().is_some())
            .unwrap_or(false)
    }

    fn state(&self) -> OperationState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(OperationState::Failed)
    }
}

/// Single-slot owner of the background operation
pub struct OperationShell {
    engine: Arc<LifecycleEngine>,
    slot: Mutex<Option<ActiveTask>>,
    grace_period: Duration,
    force_wait: Duration,
}

impl OperationShell {
    /// Shell using the engine's configured grace periods
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        let grace_period = engine.config().graceful_stop();
        let force_wait = engine.config().force_stop();
        Self::with_grace(engine, grace_period, force_wait)
    }

    pub fn with_grace(
        engine: Arc<LifecycleEngine>,
        grace_period: Duration,
        force_wait: Duration,
    ) -> Self {
        Self {
            engine,
            slot: Mutex::new(None),
            grace_period,
            force_wait,
        }
    }

    pub fn engine(&self) -> &Arc<LifecycleEngine> {
        &self.engine
    }

    /// Start `request`, displacing any active operation first
    ///
    /// `callback` runs at most once, on the worker task, unless the operation
    /// is cancelled or displaced before it completes.
    pub async fn start(
        &self,
        request: OperationRequest,
        callback: CompletionCallback,
    ) -> Displacement {
        let mut slot = self.slot.lock().await;
        let displacement = match slot.take() {
            Some(active) => self.displace(active).await,
            None => Displacement::Idle,
        };

        let kind = request.kind();
        tracing::info!(operation = %kind, status = %request.status_text(), "Starting operation");

        let cancelled = Arc::new(AtomicBool::new(false));
        let notifier: Notifier = Arc::new(std::sync::Mutex::new(Some(callback)));
        let state = Arc::new(std::sync::Mutex::new(OperationState::Running));

        let handle = tokio::spawn({
            let engine = self.engine.clone();
            let cancelled = cancelled.clone();
            let notifier = notifier.clone();
            let state = state.clone();
            async move {
                let outcome = engine.execute(request).await;
                if let Ok(mut state) = state.lock() {
                    *state = outcome.state();
                }

                if cancelled.load(Ordering::SeqCst) {
                    tracing::debug!(operation = %kind, "Outcome dropped for cancelled operation");
                    return;
                }

                let callback = notifier.lock().ok().and_then(|mut n| n.take());
                if let Some(callback) = callback {
                    callback(outcome);
                }
            }
        });

        *slot = Some(ActiveTask {
            kind,
            cancelled,
            notifier,
            state,
            handle,
        });

        displacement
    }

    /// Start `request` and receive its outcome on a channel
    ///
    /// The receiver yields `Err` if the operation is cancelled or displaced.
    pub async fn submit(
        &self,
        request: OperationRequest,
    ) -> (Displacement, oneshot::Receiver<OperationOutcome>) {
        let (tx, rx) = oneshot::channel();
        let displacement = self
            .start(
                request,
                Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                }),
            )
            .await;
        (displacement, rx)
    }

    /// Stop the active operation, waiting for it to wind down
    pub async fn stop(&self) -> Displacement {
        let active = self.slot.lock().await.take();
        match active {
            Some(active) => self.displace(active).await,
            None => Displacement::Idle,
        }
    }

    /// Suppress the active operation's notification and release the slot
    ///
    /// The worker is detached, not killed: a subprocess already running keeps
    /// going until it exits or hits its own timeout. Returns whether a pending
    /// notification was suppressed; false if it was already delivered.
    pub async fn cancel(&self) -> bool {
        let Some(active) = self.slot.lock().await.take() else {
            return false;
        };
        if !active.disconnect() {
            return false;
        }

        tracing::info!(operation = %active.kind, "Operation cancelled");
        crate::metrics::record_operation_cancelled(active.kind);
        true
    }

    /// State of the operation the shell currently owns
    ///
    /// `NotStarted` when the slot is empty, including after a cancel.
    pub async fn state(&self) -> OperationState {
        self.slot
            .lock()
            .await
            .as_ref()
            .map_or(OperationState::NotStarted, ActiveTask::state)
    }

    /// Whether an operation is still running
    pub async fn is_active(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    async fn displace(&self, active: ActiveTask) -> Displacement {
        if active.handle.is_finished() {
            return Displacement::Finished;
        }

        active.disconnect();
        let ActiveTask {
            kind, mut handle, ..
        } = active;

        let displacement = match tokio::time::timeout(self.grace_period, &mut handle).await {
            Ok(_) => {
                tracing::debug!(operation = %kind, "Previous operation stopped");
                Displacement::Stopped
            }
            Err(_) => {
                tracing::warn!(
                    operation = %kind,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "Previous operation did not stop in time, aborting"
                );
                handle.abort();
                if tokio::time::timeout(self.force_wait, &mut handle)
                    .await
                    .is_err()
                {
                    tracing::warn!(operation = %kind, "Aborted operation still winding down");
                }
                Displacement::Terminated
            }
        };

        if let Some(mode) = displacement.metric_label() {
            crate::metrics::record_operation_displaced(mode);
        }
        displacement
    }
}
