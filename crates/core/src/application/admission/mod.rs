//! Admission Queue - caps concurrently running external commands
//!
//! ```text
//! submit ──► QueueState::admit ──┬─ Dispatch ──► executor task ──► complete
//!                                ├─ Queued   (FIFO backlog)            │
//!                                └─ Rejected (bounded backlog only)    │
//!                                                                      ▼
//!            sink.deliver(outcome) ◄── QueueState::release ──► promote oldest waiter
//! ```
//!
//! All bookkeeping goes through one mutex. Execution, delivery and promotion
//! spawning happen outside of it.

pub mod constants;
mod config;
mod sink;
mod state;

pub use config::AdmissionConfig;
pub use sink::{CommandRequest, ResultReceiver, ResultSink};
pub use state::QueueStats;

use crate::domain::Invocation;
use crate::port::{CommandExecutor, CommandOutcome, ExecutionError};
use state::{Admission, DispatchSlot, QueueState, Ticket};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Admission errors (bookkeeping faults, never operational conditions)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Invalid admission config: {0}")]
    InvalidConfig(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Result sink dropped before an outcome was delivered")]
    SinkDropped,
}

struct Inner {
    executor: Arc<dyn CommandExecutor>,
    config: AdmissionConfig,
    state: Mutex<QueueState>,
    idle: Notify,
}

/// Admission Queue handle (cheap to clone, all clones share one queue)
///
/// `submit` spawns Tokio tasks and must be called from within a runtime.
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<Inner>,
}

impl AdmissionQueue {
    /// Create a queue in front of `executor`
    ///
    /// # Errors
    /// `AdmissionError::InvalidConfig` for a zero ceiling or zero timeout
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        config: AdmissionConfig,
    ) -> Result<Self, AdmissionError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                executor,
                config,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        })
    }

    /// Admit or enqueue a request; never blocks on execution
    ///
    /// The outcome always arrives through the request's sink, including the
    /// `Overloaded` refusal when a backlog bound is configured.
    pub fn submit(&self, request: CommandRequest) {
        let admission = self.lock_state().admit(request, &self.inner.config);

        match admission {
            Admission::Dispatch(slot, ticket) => self.dispatch(slot, ticket),
            Admission::Queued { seq, position } => {
                warn!(
                    request_id = seq,
                    position = position,
                    "Server is busy. Queuing request."
                );
            }
            Admission::Rejected { request, pending } => {
                let (invocation, sink) = request.into_parts();
                warn!(
                    command = %invocation,
                    pending = pending,
                    "Backlog full, refusing request"
                );
                deliver_guarded(sink, Err(ExecutionError::Overloaded(pending)));
            }
        }
    }

    /// Submit `invocation` and wait for its outcome
    ///
    /// # Errors
    /// `AdmissionError::SinkDropped` if the queue lost the request (a bug)
    pub async fn run(&self, invocation: Invocation) -> Result<CommandOutcome, AdmissionError> {
        let (request, receiver) = CommandRequest::with_channel(invocation);
        self.submit(request);
        receiver.await
    }

    pub fn stats(&self) -> QueueStats {
        self.lock_state().snapshot(&self.inner.config)
    }

    /// Resolve once nothing is running, nothing is waiting and every
    /// released outcome has been delivered
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.lock_state().is_settled() {
                return;
            }
            notified.await;
        }
    }

    // The state is only mutated by short, non-panicking sections, so a
    // poisoned lock still holds consistent data.
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, slot: DispatchSlot, ticket: Ticket) {
        let Ticket { seq, request } = ticket;
        let (invocation, sink) = request.into_parts();

        info!(request_id = seq, command = %invocation, "Executing command");

        let queue = self.clone();
        tokio::spawn(async move {
            let outcome = queue.execute_isolated(&invocation).await;
            match &outcome {
                Ok(result) => debug!(
                    request_id = seq,
                    duration_ms = result.duration_ms,
                    "Command completed"
                ),
                Err(e) => error!(request_id = seq, error = %e, "Command failed"),
            }
            queue.complete(slot, sink, outcome);
        });
    }

    /// Run the executor on its own task so a panic or a hang cannot keep the slot
    async fn execute_isolated(&self, invocation: &Invocation) -> CommandOutcome {
        let executor = Arc::clone(&self.inner.executor);
        let deadline = self.inner.config.command_timeout;
        let backstop = self.inner.config.backstop();
        let invocation = invocation.clone();

        let handle = tokio::spawn(async move { executor.execute(&invocation, deadline).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(backstop, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(ExecutionError::Panicked(panic_message(join_err.into_panic())))
            }
            Ok(Err(join_err)) => Err(ExecutionError::IoError(format!(
                "execution cancelled: {}",
                join_err
            ))),
            Err(_) => {
                abort.abort();
                warn!(
                    backstop_ms = backstop.as_millis() as u64,
                    "Executor did not return before backstop, abandoning"
                );
                Err(ExecutionError::Timeout(backstop.as_millis() as i64))
            }
        }
    }

    fn complete(&self, slot: DispatchSlot, sink: ResultSink, outcome: CommandOutcome) {
        let seq = slot.seq();
        let released = self
            .lock_state()
            .release(slot, outcome.is_err(), &self.inner.config);

        // Promoted tickets hold capacity; hand them off before any caller code runs.
        let released = match released {
            Ok(promoted) => {
                for (slot, ticket) in promoted {
                    debug!(request_id = ticket.seq, "Promoting queued request");
                    self.dispatch(slot, ticket);
                }
                true
            }
            Err(e) => {
                error!(request_id = seq, error = %e, "Admission bookkeeping fault");
                false
            }
        };

        if !deliver_guarded(sink, outcome) {
            debug!(request_id = seq, "Outcome not received by caller");
        }

        if released && self.lock_state().delivered() {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Deliver to a sink, containing a panicking callback
///
/// Returns false when the receiver was gone or the callback panicked.
fn deliver_guarded(sink: ResultSink, outcome: CommandOutcome) -> bool {
    match catch_unwind(AssertUnwindSafe(|| sink.deliver(outcome))) {
        Ok(received) => received,
        Err(payload) => {
            error!(panic = %panic_message(payload), "Result sink callback panicked");
            false
        }
    }
}

/// Extract a readable message from a panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
