// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod diagnostics;

// Re-exports
pub use admission::{AdmissionConfig, AdmissionQueue, CommandRequest, QueueStats, ResultSink};
pub use diagnostics::DiagnosticService;
