// netdiag Infrastructure - System Adapters
// Implements: CommandExecutor

pub mod subprocess_executor;

pub use subprocess_executor::SubprocessExecutor;
