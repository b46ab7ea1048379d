// Command Executor Port
// Abstraction over the process-spawn primitive the admission queue drives

use crate::domain::Invocation;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Captured output of a command that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
}

impl ExecutionResult {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }
}

/// Execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Command exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Process timeout after {0}ms")]
    Timeout(i64),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),

    #[error("Server is busy: backlog full ({0} pending)")]
    Overloaded(usize),
}

impl ExecutionError {
    /// Failure payload handed back to the client
    ///
    /// For a non-zero exit this is the captured stderr, otherwise the error text.
    pub fn detail(&self) -> String {
        match self {
            ExecutionError::NonZeroExit { stderr, .. } if !stderr.is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome delivered exactly once per submitted request
pub type CommandOutcome = Result<ExecutionResult, ExecutionError>;

/// Command Executor trait
///
/// Implementations:
/// - SubprocessExecutor (infra-system): spawns one OS process per call
/// - mocks::MockCommandExecutor / mocks::GatedExecutor: tests
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one invocation to completion
    ///
    /// Must return once the process finished or `deadline` elapsed, never retry.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::NonZeroExit if it exits unsuccessfully
    /// - ExecutionError::Timeout if it outlives `deadline`
    async fn execute(&self, invocation: &Invocation, deadline: Duration) -> CommandOutcome;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{oneshot, Notify};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Succeed with the given stdout
        Success(String),
        /// Exit non-zero with the given stderr
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Never complete
        Hang,
    }

    /// Mock Command Executor with a fixed behavior
    pub struct MockCommandExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockCommandExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }
        pub fn new_success(stdout: impl Into<String>) -> Self {
            Self::new(MockBehavior::Success(stdout.into()))
        }
        pub fn new_fail(stderr: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(stderr.into()))
        }
        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }
        pub fn new_hanging() -> Self {
            Self::new(MockBehavior::Hang)
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, _invocation: &Invocation, _deadline: Duration) -> CommandOutcome {
            *self.call_count.lock().unwrap() += 1;

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Success(stdout) => Ok(ExecutionResult::new(stdout)),
                MockBehavior::Fail(stderr) => Err(ExecutionError::NonZeroExit {
                    code: Some(1),
                    stderr,
                }),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg);
                }
                MockBehavior::Hang => std::future::pending::<CommandOutcome>().await,
            }
        }
    }

    #[derive(Default)]
    struct GateState {
        started: Vec<String>,
        gates: HashMap<String, oneshot::Sender<CommandOutcome>>,
        running: usize,
        max_running: usize,
    }

    /// Executor whose invocations block until the test releases them
    ///
    /// Invocations are keyed by their display string, so tests should submit
    /// distinct commands.
    #[derive(Default)]
    pub struct GatedExecutor {
        state: Mutex<GateState>,
        notify: Notify,
    }

    impl GatedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands in the order they reached the executor
        pub fn started(&self) -> Vec<String> {
            self.state.lock().unwrap().started.clone()
        }

        /// Currently running (not yet released) invocations
        pub fn running(&self) -> usize {
            self.state.lock().unwrap().running
        }

        /// Highest number of simultaneous invocations observed
        pub fn max_running(&self) -> usize {
            self.state.lock().unwrap().max_running
        }

        /// Wait until at least `count` invocations have started
        pub async fn wait_started(&self, count: usize) {
            loop {
                let notified = self.notify.notified();
                if self.state.lock().unwrap().started.len() >= count {
                    return;
                }
                notified.await;
            }
        }

        /// Complete the invocation with the given key; false if it is not running
        pub fn release(&self, key: &str, outcome: CommandOutcome) -> bool {
            let gate = self.state.lock().unwrap().gates.remove(key);
            match gate {
                Some(tx) => tx.send(outcome).is_ok(),
                None => false,
            }
        }

        pub fn succeed(&self, key: &str) -> bool {
            self.release(key, Ok(ExecutionResult::new(format!("{} ok", key))))
        }

        pub fn fail(&self, key: &str, stderr: &str) -> bool {
            self.release(
                key,
                Err(ExecutionError::NonZeroExit {
                    code: Some(1),
                    stderr: stderr.to_string(),
                }),
            )
        }
    }

    #[async_trait]
    impl CommandExecutor for GatedExecutor {
        async fn execute(&self, invocation: &Invocation, _deadline: Duration) -> CommandOutcome {
            let key = invocation.to_string();
            let (tx, rx) = oneshot::channel();
            {
                let mut state = self.state.lock().unwrap();
                state.started.push(key.clone());
                state.gates.insert(key, tx);
                state.running += 1;
                state.max_running = state.max_running.max(state.running);
            }
            self.notify.notify_waiters();

            let outcome = rx
                .await
                .unwrap_or_else(|_| Err(ExecutionError::IoError("gate dropped".to_string())));

            self.state.lock().unwrap().running -= 1;
            outcome
        }
    }
}
