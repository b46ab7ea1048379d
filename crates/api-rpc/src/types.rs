//! RPC Request/Response Types
//!
//! Parameters arrive as a named-params object. Required fields are optional
//! at the serde level so a missing one maps to the same validation error as
//! an empty one.

use netdiag_core::application::QueueStats;
use netdiag_core::domain::diagnostic::DEFAULT_PING_COUNT;
use netdiag_core::domain::{DiagnosticRequest, DomainError, RecordType};
use netdiag_core::port::ExecutionResult;
use serde::{Deserialize, Serialize};

/// net.dig.v1 - DNS lookup
#[derive(Debug, Default, Deserialize)]
pub struct DigRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
}

impl DigRequest {
    pub fn into_diagnostic(self) -> Result<DiagnosticRequest, DomainError> {
        let record_type = match self.record_type.as_deref() {
            None | Some("") => RecordType::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(DiagnosticRequest::Dig {
            domain: required(self.domain, "domain")?,
            record_type,
        })
    }
}

/// net.ping.v1 - ICMP echo
#[derive(Debug, Default, Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub count: Option<u8>,
}

impl PingRequest {
    pub fn into_diagnostic(self) -> Result<DiagnosticRequest, DomainError> {
        Ok(DiagnosticRequest::Ping {
            host: required(self.host, "host")?,
            count: self.count.unwrap_or(DEFAULT_PING_COUNT),
        })
    }
}

/// net.traceroute.v1
#[derive(Debug, Default, Deserialize)]
pub struct TracerouteRequest {
    #[serde(default)]
    pub host: Option<String>,
}

impl TracerouteRequest {
    pub fn into_diagnostic(self) -> Result<DiagnosticRequest, DomainError> {
        Ok(DiagnosticRequest::Traceroute {
            host: required(self.host, "host")?,
        })
    }
}

/// net.nmap.v1 - options is a single space-separated string
#[derive(Debug, Default, Deserialize)]
pub struct NmapRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub options: Option<String>,
}

impl NmapRequest {
    pub fn into_diagnostic(self) -> Result<DiagnosticRequest, DomainError> {
        Ok(DiagnosticRequest::Nmap {
            host: required(self.host, "host")?,
            options: DiagnosticRequest::split_options(self.options.as_deref().unwrap_or("")),
        })
    }
}

/// net.whois.v1
#[derive(Debug, Default, Deserialize)]
pub struct WhoisRequest {
    #[serde(default)]
    pub domain: Option<String>,
}

impl WhoisRequest {
    pub fn into_diagnostic(self) -> Result<DiagnosticRequest, DomainError> {
        Ok(DiagnosticRequest::Whois {
            domain: required(self.domain, "domain")?,
        })
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, DomainError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(DomainError::MissingParameter(name)),
    }
}

/// Successful diagnostic: the command's stdout
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResponse {
    pub result: String,
    pub duration_ms: i64,
}

impl From<ExecutionResult> for DiagnosticResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            result: result.stdout,
            duration_ms: result.duration_ms,
        }
    }
}

/// admin.health.v1
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// admin.stats.v1 - queue counters plus uptime
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub queue: QueueStats,
    pub uptime_seconds: u64,
}
