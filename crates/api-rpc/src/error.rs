//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use netdiag_core::error::AppError;
use netdiag_core::port::ExecutionError;
use serde::Serialize;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const OVERLOADED: i32 = 4029;
    pub const FORBIDDEN: i32 = 4030;
    pub const EXECUTION_FAILED: i32 = 5000;
    pub const INTERNAL_ERROR: i32 = 5001;
}

/// Structured data attached to execution failures
#[derive(Debug, Serialize)]
struct ExecutionErrorData {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
}

fn execution_kind(err: &ExecutionError) -> &'static str {
    match err {
        ExecutionError::SpawnFailed(_) => "spawn_failed",
        ExecutionError::NonZeroExit { .. } => "non_zero_exit",
        ExecutionError::Timeout(_) => "timeout",
        ExecutionError::IoError(_) => "io",
        ExecutionError::Panicked(_) => "panicked",
        ExecutionError::Overloaded(_) => "overloaded",
    }
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Forbidden(msg) => ErrorObjectOwned::owned(code::FORBIDDEN, msg, None::<()>),
        AppError::Execution(e @ ExecutionError::Overloaded(_)) => {
            ErrorObjectOwned::owned(code::OVERLOADED, e.to_string(), None::<()>)
        }
        AppError::Execution(e) => {
            let data = ExecutionErrorData {
                kind: execution_kind(&e),
                exit_code: match &e {
                    ExecutionError::NonZeroExit { code, .. } => *code,
                    _ => None,
                },
            };
            ErrorObjectOwned::owned(code::EXECUTION_FAILED, e.detail(), Some(data))
        }
        AppError::Admission(e) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>)
        }
        AppError::Config(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}
