// Port Layer - Interfaces for external dependencies

pub mod command_executor;
pub mod time_provider;

// Re-exports
pub use command_executor::{CommandExecutor, CommandOutcome, ExecutionError, ExecutionResult};
pub use time_provider::TimeProvider;
