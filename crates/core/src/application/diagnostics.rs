// Diagnostic Service - validate, apply policy, run through the admission queue

use crate::application::admission::AdmissionQueue;
use crate::domain::{DiagnosticRequest, PrivilegePolicy};
use crate::error::{AppError, Result};
use crate::port::ExecutionResult;
use tracing::{info, warn};

/// Diagnostic Service
pub struct DiagnosticService {
    queue: AdmissionQueue,
    policy: PrivilegePolicy,
}

impl DiagnosticService {
    pub fn new(queue: AdmissionQueue, policy: PrivilegePolicy) -> Self {
        Self { queue, policy }
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    /// Run one diagnostic and wait for its output
    ///
    /// # Errors
    /// - AppError::Domain if an argument fails validation
    /// - AppError::Forbidden if the invocation needs elevated privileges
    /// - AppError::Execution if the command fails, times out or is refused
    ///   because the backlog is full
    pub async fn run(&self, request: DiagnosticRequest) -> Result<ExecutionResult> {
        request.validate()?;

        let invocation = request.to_invocation();
        if let Err(e) = self.policy.check(&invocation) {
            warn!(command = %invocation, reason = %e, "Refusing to execute privileged command");
            return Err(AppError::Forbidden(e.to_string()));
        }

        info!(kind = request.kind(), command = %invocation, "Diagnostic accepted");

        let result = self.queue.run(invocation).await??;
        Ok(result)
    }
}
