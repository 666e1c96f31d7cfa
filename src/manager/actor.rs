//! Single-worker active object.
//!
//! # Responsibilities
//! - Own a piece of mutable state on one worker task
//! - Accept commands from any number of callers through a bounded queue
//! - Request/response (`submit`) and fire-and-forget (`submit_async`) entry points
//! - Orderly shutdown: stop intake, wait for pending hand-offs, drain, stop
//!
//! # States
//! ```text
//! Running ──close()──▶ Draining ──queue drained──▶ Closed
//! ```
//!
//! # Design Decisions
//! - Commands run one at a time, in dequeue order
//! - Fire-and-forget hand-offs run on a `TaskTracker`; `close` waits for
//!   them to be enqueued before shutting the queue
//! - The queue closes when its last sender drops, so nothing already handed
//!   off is lost

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Queue capacity used by the config manager.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Lifecycle state of an active object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Accepting commands.
    Running,
    /// No new external commands; queued commands still run.
    Draining,
    /// Worker has stopped.
    Closed,
}

/// Error returned to callers of an active object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("active object is not accepting commands (state: {0:?})")]
    NotRunning(ActorState),

    #[error("worker stopped before replying")]
    WorkerGone,
}

/// The state owned by an active object, and how it reacts to commands.
pub trait Handler: Send + 'static {
    type Command: Send + 'static;

    /// Execute one command. `mailbox` lets the handler queue follow-up work.
    fn handle(
        &mut self,
        command: Self::Command,
        mailbox: &Mailbox<Self::Command>,
    ) -> impl Future<Output = ()> + Send;
}

struct Gate<C> {
    state: ActorState,
    sender: Option<mpsc::Sender<C>>,
}

struct Shared<C> {
    gate: Mutex<Gate<C>>,
    dispatches: TaskTracker,
}

impl<C> Shared<C> {
    fn gate(&self) -> MutexGuard<'_, Gate<C>> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Enqueue handle shared by the active object and its worker.
pub struct Mailbox<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for Mailbox<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Send + 'static> Mailbox<C> {
    pub fn state(&self) -> ActorState {
        self.shared.gate().state
    }

    /// Queue a command without waiting for it to be enqueued or executed.
    ///
    /// Accepted while the queue is open, including while draining. Returns
    /// `false` (and logs) once the queue has been shut.
    pub fn dispatch(&self, command: C) -> bool {
        let sender = self.shared.gate().sender.clone();
        match sender {
            Some(sender) => {
                self.spawn_send(sender, command);
                true
            }
            None => {
                tracing::warn!("Command dispatched after queue shutdown; discarding");
                false
            }
        }
    }

    fn spawn_send(&self, sender: mpsc::Sender<C>, command: C) {
        self.shared.dispatches.spawn(async move {
            if sender.send(command).await.is_err() {
                tracing::warn!("Worker stopped before a dispatched command was enqueued");
            }
        });
    }

    fn sender_if_running(&self) -> Result<mpsc::Sender<C>, ActorError> {
        let gate = self.shared.gate();
        match (&gate.sender, gate.state) {
            (Some(sender), ActorState::Running) => Ok(sender.clone()),
            (_, state) => Err(ActorError::NotRunning(state)),
        }
    }
}

/// A running active object.
pub struct ActiveObject<C> {
    mailbox: Mailbox<C>,
    worker: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl<C> Clone for ActiveObject<C> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox.clone(),
            worker: Arc::clone(&self.worker),
        }
    }
}

impl<C: Send + 'static> ActiveObject<C> {
    /// Start the worker task. Must be called inside a Tokio runtime.
    pub fn spawn<H>(mut handler: H, capacity: usize) -> Self
    where
        H: Handler<Command = C>,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let mailbox = Mailbox {
            shared: Arc::new(Shared {
                gate: Mutex::new(Gate {
                    state: ActorState::Running,
                    sender: Some(tx),
                }),
                dispatches: TaskTracker::new(),
            }),
        };

        let worker_mailbox = mailbox.clone();
        let worker = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                handler.handle(command, &worker_mailbox).await;
            }
            tracing::debug!("Active object queue drained, worker exiting");
        });

        Self {
            mailbox,
            worker: Arc::new(tokio::sync::Mutex::new(Some(worker))),
        }
    }

    pub fn state(&self) -> ActorState {
        self.mailbox.state()
    }

    /// Enqueue a command and wait for its reply.
    ///
    /// `make` receives the reply channel and builds the command. Other callers
    /// are not blocked while this one waits.
    pub async fn submit<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> C,
    ) -> Result<R, ActorError> {
        let sender = self.mailbox.sender_if_running()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(make(reply_tx))
            .await
            .map_err(|_| ActorError::WorkerGone)?;
        drop(sender);
        reply_rx.await.map_err(|_| ActorError::WorkerGone)
    }

    /// Enqueue a command without waiting. Tracked so `close` cannot race it.
    pub fn submit_async(&self, command: C) -> Result<(), ActorError> {
        let sender = self.mailbox.sender_if_running()?;
        self.mailbox.spawn_send(sender, command);
        Ok(())
    }

    /// Stop intake, wait for pending dispatches, drain the queue, stop.
    ///
    /// Concurrent callers all return once the worker has exited.
    pub async fn close(&self) {
        let first = {
            let mut gate = self.mailbox.shared.gate();
            if gate.state == ActorState::Running {
                gate.state = ActorState::Draining;
                true
            } else {
                false
            }
        };

        if first {
            let dispatches = &self.mailbox.shared.dispatches;
            dispatches.close();
            dispatches.wait().await;

            // Dropping the last long-lived sender lets the worker's recv()
            // return None once the queue is empty.
            self.mailbox.shared.gate().sender = None;
        }

        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Active object worker failed");
            }
            self.mailbox.shared.gate().state = ActorState::Closed;
        }
    }
}
