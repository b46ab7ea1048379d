// Queue state - the only mutable state of the admission queue
//
// Everything here is synchronous and runs under the queue's mutex. The async
// side (spawning, delivery) happens after the lock is released.

use super::sink::CommandRequest;
use super::{AdmissionConfig, AdmissionError};
use serde::Serialize;
use std::collections::VecDeque;

/// A request tagged with its arrival sequence number
#[derive(Debug)]
pub(crate) struct Ticket {
    pub(crate) seq: u64,
    pub(crate) request: CommandRequest,
}

/// One unit of held capacity
///
/// Only `QueueState` creates slots and `release` consumes them, so a
/// dispatched request can be completed at most once.
#[must_use = "a dispatch slot must be released or capacity leaks"]
#[derive(Debug)]
pub(crate) struct DispatchSlot {
    seq: u64,
}

impl DispatchSlot {
    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of an admission decision
#[derive(Debug)]
pub(crate) enum Admission {
    /// Capacity available: run now
    Dispatch(DispatchSlot, Ticket),
    /// At the ceiling: waiting at `position` (1-based) in the backlog
    Queued { seq: u64, position: usize },
    /// Backlog bound reached
    Rejected {
        request: CommandRequest,
        pending: usize,
    },
}

/// Point-in-time view of the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub active: usize,
    pub pending: usize,
    pub max_concurrency: usize,
    pub max_pending: Option<usize>,
    pub dispatched_total: u64,
    pub completed_total: u64,
    pub failed_total: u64,
    pub rejected_total: u64,
}

impl QueueStats {
    /// Nothing running and nothing waiting
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.pending == 0
    }
}

#[derive(Debug, Default)]
pub(crate) struct QueueState {
    active: usize,
    pending: VecDeque<Ticket>,
    next_seq: u64,
    dispatched_total: u64,
    completed_total: u64,
    failed_total: u64,
    rejected_total: u64,
    // released but outcome not yet handed to the sink
    undelivered: usize,
}

impl QueueState {
    /// Decide whether a new request runs now, waits, or is refused
    pub(crate) fn admit(&mut self, request: CommandRequest, config: &AdmissionConfig) -> Admission {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.active < config.max_concurrency {
            debug_assert!(
                self.pending.is_empty(),
                "free capacity with a non-empty backlog"
            );
            let (slot, ticket) = self.start(Ticket { seq, request });
            return Admission::Dispatch(slot, ticket);
        }

        if let Some(limit) = config.max_pending {
            if self.pending.len() >= limit {
                self.rejected_total += 1;
                return Admission::Rejected {
                    request,
                    pending: self.pending.len(),
                };
            }
        }

        self.pending.push_back(Ticket { seq, request });
        Admission::Queued {
            seq,
            position: self.pending.len(),
        }
    }

    /// Free the capacity held by `slot` and promote waiters into it
    ///
    /// Returns the promoted tickets, oldest first. Under a fixed ceiling this is
    /// at most one.
    ///
    /// # Errors
    /// `InvariantViolation` if no capacity is held; state is left untouched.
    pub(crate) fn release(
        &mut self,
        slot: DispatchSlot,
        failed: bool,
        config: &AdmissionConfig,
    ) -> Result<Vec<(DispatchSlot, Ticket)>, AdmissionError> {
        if self.active == 0 {
            return Err(AdmissionError::InvariantViolation(format!(
                "completion for request #{} with no active executions",
                slot.seq
            )));
        }

        self.active -= 1;
        self.undelivered += 1;
        self.completed_total += 1;
        if failed {
            self.failed_total += 1;
        }

        let mut promoted = Vec::new();
        while self.active < config.max_concurrency {
            let Some(ticket) = self.pending.pop_front() else {
                break;
            };
            promoted.push(self.start(ticket));
        }
        Ok(promoted)
    }

    /// Record that a released request's outcome reached its sink
    ///
    /// Returns true when the queue is now settled.
    pub(crate) fn delivered(&mut self) -> bool {
        self.undelivered = self.undelivered.saturating_sub(1);
        self.is_settled()
    }

    /// Nothing running, nothing waiting, no outcome still in transit
    pub(crate) fn is_settled(&self) -> bool {
        self.active == 0 && self.pending.is_empty() && self.undelivered == 0
    }

    pub(crate) fn snapshot(&self, config: &AdmissionConfig) -> QueueStats {
        QueueStats {
            active: self.active,
            pending: self.pending.len(),
            max_concurrency: config.max_concurrency,
            max_pending: config.max_pending,
            dispatched_total: self.dispatched_total,
            completed_total: self.completed_total,
            failed_total: self.failed_total,
            rejected_total: self.rejected_total,
        }
    }

    fn start(&mut self, ticket: Ticket) -> (DispatchSlot, Ticket) {
        self.active += 1;
        self.dispatched_total += 1;
        (DispatchSlot { seq: ticket.seq }, ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::admission::ResultSink;
    use crate::domain::Invocation;

    fn request(name: &str) -> CommandRequest {
        CommandRequest::new(Invocation::new(name), ResultSink::from_fn(|_| {}))
    }

    fn expect_dispatch(admission: Admission) -> (DispatchSlot, Ticket) {
        match admission {
            Admission::Dispatch(slot, ticket) => (slot, ticket),
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_admits_up_to_ceiling_then_queues() {
        let config = AdmissionConfig::new(2);
        let mut state = QueueState::default();

        let _a = expect_dispatch(state.admit(request("c1"), &config));
        let _b = expect_dispatch(state.admit(request("c2"), &config));
        assert!(matches!(
            state.admit(request("c3"), &config),
            Admission::Queued { position: 1, .. }
        ));
        assert!(matches!(
            state.admit(request("c4"), &config),
            Admission::Queued { position: 2, .. }
        ));

        let stats = state.snapshot(&config);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.dispatched_total, 2);
    }

    #[test]
    fn test_release_promotes_oldest_waiter_only() {
        let config = AdmissionConfig::new(1);
        let mut state = QueueState::default();

        let (slot, _) = expect_dispatch(state.admit(request("c1"), &config));
        let _ = state.admit(request("c2"), &config);
        let _ = state.admit(request("c3"), &config);

        let promoted = state.release(slot, false, &config).unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].1.request.invocation().program(), "c2");
        assert_eq!(promoted[0].0.seq(), 1);

        let stats = state.snapshot(&config);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed_total, 1);
    }

    #[test]
    fn test_release_without_waiters_frees_capacity() {
        let config = AdmissionConfig::new(1);
        let mut state = QueueState::default();

        let (slot, _) = expect_dispatch(state.admit(request("c1"), &config));
        let promoted = state.release(slot, true, &config).unwrap();
        assert!(promoted.is_empty());

        let stats = state.snapshot(&config);
        assert!(stats.is_idle());
        assert_eq!(stats.failed_total, 1);
    }

    #[test]
    fn test_not_settled_until_outcome_delivered() {
        let config = AdmissionConfig::new(1);
        let mut state = QueueState::default();
        assert!(state.is_settled());

        let (slot, _) = expect_dispatch(state.admit(request("c1"), &config));
        state.release(slot, false, &config).unwrap();
        assert!(state.snapshot(&config).is_idle());
        assert!(!state.is_settled());

        assert!(state.delivered());
    }

    #[test]
    fn test_bounded_backlog_rejects_when_full() {
        let config = AdmissionConfig::new(1).with_max_pending(1);
        let mut state = QueueState::default();

        let _ = expect_dispatch(state.admit(request("c1"), &config));
        assert!(matches!(
            state.admit(request("c2"), &config),
            Admission::Queued { .. }
        ));
        match state.admit(request("c3"), &config) {
            Admission::Rejected { request, pending } => {
                assert_eq!(request.invocation().program(), "c3");
                assert_eq!(pending, 1);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(state.snapshot(&config).rejected_total, 1);
    }

    #[test]
    fn test_release_underflow_is_invariant_violation() {
        let config = AdmissionConfig::new(1);
        let mut state = QueueState::default();

        let forged = DispatchSlot { seq: 42 };
        let err = state.release(forged, false, &config).unwrap_err();
        assert!(matches!(err, AdmissionError::InvariantViolation(_)));

        // untouched
        let stats = state.snapshot(&config);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.completed_total, 0);
    }

    #[test]
    fn test_sequence_numbers_follow_arrival_order() {
        let config = AdmissionConfig::new(1);
        let mut state = QueueState::default();

        let (first, _) = expect_dispatch(state.admit(request("c1"), &config));
        assert_eq!(first.seq(), 0);
        assert!(matches!(
            state.admit(request("c2"), &config),
            Admission::Queued { seq: 1, .. }
        ));
        let promoted = state.release(first, false, &config).unwrap();
        assert_eq!(promoted[0].1.seq, 1);
    }
}
