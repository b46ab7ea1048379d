// Admission constants
use std::time::Duration;

/// Default ceiling on simultaneously running external processes
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default wall-clock deadline for one dispatched command (30s)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Time between SIGTERM and SIGKILL once a command hits its deadline (2s)
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Extra slack the queue allows on top of deadline + grace before it gives up
/// on an executor that did not return
pub const BACKSTOP_SLACK: Duration = Duration::from_millis(500);
