// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Admission error: {0}")]
    Admission(#[from] crate::application::admission::AdmissionError),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when the error originates from caller input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Forbidden(_) | AppError::Domain(_)
        )
    }
}
