// Privilege Policy - pre-submit predicate over an Invocation

use super::error::{DomainError, Result};
use super::invocation::Invocation;

/// Programs that are never executed
const DEFAULT_DENIED_PROGRAMS: &[&str] = &["sudo", "su", "doas"];

/// nmap scan types that need raw sockets (root)
const DEFAULT_NMAP_PRIVILEGED_FLAGS: &[&str] = &["-sS", "-sU", "-sO"];

/// Refuses invocations that require elevated privileges
#[derive(Debug, Clone)]
pub struct PrivilegePolicy {
    denied_programs: Vec<String>,
    nmap_privileged_flags: Vec<String>,
}

impl Default for PrivilegePolicy {
    fn default() -> Self {
        Self {
            denied_programs: DEFAULT_DENIED_PROGRAMS.iter().map(|s| s.to_string()).collect(),
            nmap_privileged_flags: DEFAULT_NMAP_PRIVILEGED_FLAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PrivilegePolicy {
    pub fn new(denied_programs: Vec<String>, nmap_privileged_flags: Vec<String>) -> Self {
        Self {
            denied_programs,
            nmap_privileged_flags,
        }
    }

    /// Check an invocation before it is submitted
    ///
    /// # Errors
    /// `DomainError::PrivilegeRequired` if the program is denied or an nmap
    /// argument selects a raw-socket scan type.
    pub fn check(&self, invocation: &Invocation) -> Result<()> {
        let program = base_name(invocation.program());

        if self.denied_programs.iter().any(|p| p == program) {
            return Err(DomainError::PrivilegeRequired(format!(
                "program '{}' is not allowed",
                program
            )));
        }

        if program == "nmap" {
            // Flags may be combined (e.g. -sSV), so match on substring
            let privileged = invocation.arguments().iter().find(|arg| {
                self.nmap_privileged_flags
                    .iter()
                    .any(|flag| arg.contains(flag.as_str()))
            });
            if let Some(arg) = privileged {
                return Err(DomainError::PrivilegeRequired(format!(
                    "nmap option '{}' requires raw socket access",
                    arg
                )));
            }
        }

        Ok(())
    }
}

fn base_name(program: &str) -> &str {
    program.rsplit('/').next().unwrap_or(program)
}
