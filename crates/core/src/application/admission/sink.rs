// Result sink - single-use delivery target for one request's outcome

use super::AdmissionError;
use crate::domain::Invocation;
use crate::port::CommandOutcome;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

type Callback = Box<dyn FnOnce(CommandOutcome) + Send + 'static>;

enum SinkKind {
    Channel(oneshot::Sender<CommandOutcome>),
    Callback(Callback),
}

/// Delivery handle for exactly one outcome
///
/// `deliver` takes `self`, so an outcome can never be delivered twice.
pub struct ResultSink {
    kind: SinkKind,
}

impl ResultSink {
    /// Sink backed by a oneshot channel, plus the receiving half
    pub fn channel() -> (Self, ResultReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                kind: SinkKind::Channel(tx),
            },
            ResultReceiver { rx },
        )
    }

    /// Sink that invokes a callback on delivery
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(CommandOutcome) + Send + 'static,
    {
        Self {
            kind: SinkKind::Callback(Box::new(f)),
        }
    }

    /// Deliver the outcome; false if the receiving side is already gone
    pub fn deliver(self, outcome: CommandOutcome) -> bool {
        match self.kind {
            SinkKind::Channel(tx) => tx.send(outcome).is_ok(),
            SinkKind::Callback(f) => {
                f(outcome);
                true
            }
        }
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SinkKind::Channel(_) => "channel",
            SinkKind::Callback(_) => "callback",
        };
        f.debug_struct("ResultSink").field("kind", &kind).finish()
    }
}

/// Receiving half of a channel-backed sink
///
/// Resolves to `AdmissionError::SinkDropped` if the sink was dropped without
/// delivering, which only happens on a bookkeeping bug.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: oneshot::Receiver<CommandOutcome>,
}

impl Future for ResultReceiver {
    type Output = Result<CommandOutcome, AdmissionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| AdmissionError::SinkDropped))
    }
}

/// A pending unit of work: what to run and where its outcome goes
#[derive(Debug)]
pub struct CommandRequest {
    invocation: Invocation,
    sink: ResultSink,
}

impl CommandRequest {
    pub fn new(invocation: Invocation, sink: ResultSink) -> Self {
        Self { invocation, sink }
    }

    /// Request with a fresh channel sink
    pub fn with_channel(invocation: Invocation) -> (Self, ResultReceiver) {
        let (sink, rx) = ResultSink::channel();
        (Self::new(invocation, sink), rx)
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub(crate) fn into_parts(self) -> (Invocation, ResultSink) {
        (self.invocation, self.sink)
    }
}
