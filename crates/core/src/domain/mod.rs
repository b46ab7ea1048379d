// Domain Layer - Pure business logic and entities

pub mod diagnostic;
pub mod error;
pub mod invocation;
pub mod policy;

// Re-exports
pub use diagnostic::{DiagnosticRequest, RecordType};
pub use error::DomainError;
pub use invocation::Invocation;
pub use policy::PrivilegePolicy;
