// Admission Queue configuration

use super::constants::*;
use super::AdmissionError;
use std::time::Duration;

/// Admission Queue configuration
///
/// The ceiling is fixed for the lifetime of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum simultaneously running commands
    pub max_concurrency: usize,
    /// Backlog bound; `None` keeps the backlog unbounded
    pub max_pending: Option<usize>,
    /// Deadline handed to the executor for each command
    pub command_timeout: Duration,
    /// Grace between polite and forced termination
    pub kill_grace: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_pending: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl AdmissionConfig {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Default::default()
        }
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Time after which the queue abandons an executor that never returned
    pub fn backstop(&self) -> Duration {
        self.command_timeout + self.kill_grace + BACKSTOP_SLACK
    }

    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.max_concurrency == 0 {
            return Err(AdmissionError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(AdmissionError::InvalidConfig(
                "command_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
