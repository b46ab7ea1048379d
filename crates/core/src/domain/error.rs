// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0} query parameter is required")]
    MissingParameter(&'static str),

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Unsupported record type: {0}")]
    InvalidRecordType(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Value out of range: {name}={value} (allowed {min}..={max})")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Privilege required: {0}")]
    PrivilegeRequired(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
