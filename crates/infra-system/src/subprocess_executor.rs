// Subprocess executor implementation
// reason: tokio::process for async child management, nix for SIGTERM on unix
use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use netdiag_core::application::admission::constants::DEFAULT_KILL_GRACE;
use netdiag_core::domain::Invocation;
use netdiag_core::port::command_executor::{
    CommandExecutor, CommandOutcome, ExecutionError, ExecutionResult,
};
use netdiag_core::port::TimeProvider;

/// Subprocess executor
/// Spawns one child per invocation, no shell, with environment allowlisting
pub struct SubprocessExecutor {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
    kill_grace: Duration,
}

impl SubprocessExecutor {
    /// Create a new subprocess executor
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Parent environment variables passed to children
    ///
    /// # Example
    /// ```ignore
    /// let executor = SubprocessExecutor::new(
    ///     Arc::new(SystemTimeProvider),
    ///     vec!["PATH".to_string(), "HOME".to_string(), "LANG".to_string()],
    /// );
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Time a timed-out child gets between SIGTERM and SIGKILL
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Filter environment variables to allowlist only
    ///
    /// Works on raw OS strings so non-UTF-8 values neither panic nor get mangled.
    fn filter_env<I>(&self, env: I) -> HashMap<OsString, OsString>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        env.into_iter()
            .filter(|(k, _)| {
                self.env_allowlist
                    .iter()
                    .any(|allowed| k.as_os_str() == OsStr::new(allowed))
            })
            .collect()
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Child, ExecutionError> {
        let env = self.filter_env(std::env::vars_os());

        Command::new(invocation.program())
            .args(invocation.arguments())
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(format!("{}: {}", invocation.program(), e)))
    }

    /// Spawn child process and wait for exit and output, bounded by `deadline`
    async fn spawn_and_wait(
        &self,
        invocation: &Invocation,
        deadline: Duration,
    ) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), ExecutionError> {
        let mut child = self.spawn(invocation)?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let waited = {
            let running = &mut child;
            let run = async move {
                tokio::try_join!(running.wait(), read_pipe(stdout), read_pipe(stderr))
            };
            timeout(deadline, run).await
        };

        match waited {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ExecutionError::IoError(e.to_string())),
            Err(_) => {
                warn!(
                    command = %invocation,
                    timeout_ms = deadline.as_millis() as u64,
                    "Process exceeded deadline"
                );
                self.terminate(&mut child).await;
                Err(ExecutionError::Timeout(deadline.as_millis() as i64))
            }
        }
    }

    /// Build execution outcome from process output
    fn build_outcome(
        &self,
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        duration_ms: i64,
    ) -> CommandOutcome {
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        if status.success() {
            Ok(ExecutionResult {
                stdout,
                stderr,
                duration_ms,
            })
        } else {
            Err(ExecutionError::NonZeroExit {
                code: status.code(),
                stderr,
            })
        }
    }

    /// Kill process with SIGTERM first, then SIGKILL if needed
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                info!(pid = pid, "Sending SIGTERM for graceful shutdown");
                match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    Ok(()) => {
                        if let Ok(Ok(status)) = timeout(self.kill_grace, child.wait()).await {
                            info!(pid = pid, status = %status, "Process exited after SIGTERM");
                            return;
                        }
                        warn!(pid = pid, "Process did not exit after SIGTERM, sending SIGKILL");
                    }
                    Err(e) => warn!(pid = pid, error = %e, "SIGTERM failed, sending SIGKILL"),
                }
            }
        }

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to kill child process");
        }
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl CommandExecutor for SubprocessExecutor {
    async fn execute(&self, invocation: &Invocation, deadline: Duration) -> CommandOutcome {
        let start_time = self.time_provider.now_millis();

        info!(
            command = %invocation,
            timeout_ms = deadline.as_millis() as u64,
            "Starting subprocess execution"
        );

        let (status, stdout, stderr) = self.spawn_and_wait(invocation, deadline).await?;

        let duration_ms = self.time_provider.now_millis() - start_time;
        let outcome = self.build_outcome(status, stdout, stderr, duration_ms);

        info!(
            command = %invocation,
            duration_ms = duration_ms,
            exit_code = ?status.code(),
            success = outcome.is_ok(),
            "Subprocess execution completed"
        );

        outcome
    }
}
