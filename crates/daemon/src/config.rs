//! Daemon configuration from `NETDIAG_*` environment variables

use netdiag_api_rpc::RpcServerConfig;
use netdiag_core::application::admission::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_KILL_GRACE, DEFAULT_MAX_CONCURRENCY,
};
use netdiag_core::application::AdmissionConfig;
use netdiag_core::error::{AppError, Result};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment passed through to diagnostic subprocesses
pub const ENV_ALLOWLIST: [&str; 3] = ["PATH", "HOME", "LANG"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub rpc: RpcServerConfig,
    pub admission: AdmissionConfig,
    pub shutdown_timeout: Duration,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    ///
    /// # Errors
    /// `AppError::Config` for unparsable numbers, an unknown log format, or an
    /// admission config that fails validation
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RpcServerConfig::default();
        let rpc = RpcServerConfig {
            host: lookup("NETDIAG_RPC_HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "NETDIAG_RPC_PORT")?.unwrap_or(defaults.port),
        };

        let max_concurrency =
            parse(&lookup, "NETDIAG_MAX_CONCURRENCY")?.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        let command_timeout =
            millis(&lookup, "NETDIAG_COMMAND_TIMEOUT_MS")?.unwrap_or(DEFAULT_COMMAND_TIMEOUT);
        let kill_grace = millis(&lookup, "NETDIAG_KILL_GRACE_MS")?.unwrap_or(DEFAULT_KILL_GRACE);
        let mut admission = AdmissionConfig::new(max_concurrency)
            .with_command_timeout(command_timeout)
            .with_kill_grace(kill_grace);
        if let Some(limit) = parse(&lookup, "NETDIAG_MAX_PENDING")? {
            admission = admission.with_max_pending(limit);
        }
        admission
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let shutdown_timeout =
            millis(&lookup, "NETDIAG_SHUTDOWN_TIMEOUT_MS")?.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        let log_format = match lookup("NETDIAG_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "NETDIAG_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            rpc,
            admission,
            shutdown_timeout,
            log_format,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}='{}': {}", key, raw, e))),
    }
}

fn millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse::<F, u64>(lookup, key)?.map(Duration::from_millis))
}
