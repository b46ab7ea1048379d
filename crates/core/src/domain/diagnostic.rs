// Diagnostic Domain Model
//
// Each diagnostic maps to exactly one external program invocation. Arguments are
// validated here so that nothing reaching the admission queue can smuggle extra
// options or shell syntax into the child process.

use super::error::{DomainError, Result};
use super::invocation::Invocation;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Maximum length of a fully-qualified domain name
const MAX_HOST_LEN: usize = 253;

/// Maximum length of a single DNS label
const MAX_LABEL_LEN: usize = 63;

/// Default number of echo requests sent by `ping`
pub const DEFAULT_PING_COUNT: u8 = 4;

/// Upper bound on `ping -c`
pub const MAX_PING_COUNT: u8 = 10;

/// nmap options that read or write local files, or load scripts
const NMAP_DENIED_PREFIXES: &[&str] = &[
    "-o",
    "-i",
    "--script",
    "--datadir",
    "--resume",
    "--stylesheet",
    "--servicedb",
    "--versiondb",
    "--excludefile",
];

/// DNS record types accepted by the `dig` diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordType {
    #[default]
    A,
    Aaaa,
    Any,
    Caa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Srv,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Any => "ANY",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "ANY" => Ok(RecordType::Any),
            "CAA" => Ok(RecordType::Caa),
            "CNAME" => Ok(RecordType::Cname),
            "MX" => Ok(RecordType::Mx),
            "NS" => Ok(RecordType::Ns),
            "PTR" => Ok(RecordType::Ptr),
            "SOA" => Ok(RecordType::Soa),
            "SRV" => Ok(RecordType::Srv),
            "TXT" => Ok(RecordType::Txt),
            _ => Err(DomainError::InvalidRecordType(s.to_string())),
        }
    }
}

/// A network diagnostic requested by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticRequest {
    Dig {
        domain: String,
        record_type: RecordType,
    },
    Ping {
        host: String,
        count: u8,
    },
    Traceroute {
        host: String,
    },
    Nmap {
        host: String,
        options: Vec<String>,
    },
    Whois {
        domain: String,
    },
}

impl DiagnosticRequest {
    /// Short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticRequest::Dig { .. } => "dig",
            DiagnosticRequest::Ping { .. } => "ping",
            DiagnosticRequest::Traceroute { .. } => "traceroute",
            DiagnosticRequest::Nmap { .. } => "nmap",
            DiagnosticRequest::Whois { .. } => "whois",
        }
    }

    /// Split a raw nmap option string into argv tokens
    pub fn split_options(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    /// Validate every argument
    ///
    /// # Errors
    /// - `MissingParameter` when host/domain is empty
    /// - `InvalidHost` for anything that is not a hostname or IP literal
    /// - `InvalidOption` for nmap tokens with disallowed characters or prefixes
    /// - `OutOfRange` for a ping count outside 1..=10
    pub fn validate(&self) -> Result<()> {
        match self {
            DiagnosticRequest::Dig { domain, .. } | DiagnosticRequest::Whois { domain } => {
                validate_host("domain", domain)
            }
            DiagnosticRequest::Ping { host, count } => {
                validate_host("host", host)?;
                if *count == 0 || *count > MAX_PING_COUNT {
                    return Err(DomainError::OutOfRange {
                        name: "count",
                        value: i64::from(*count),
                        min: 1,
                        max: i64::from(MAX_PING_COUNT),
                    });
                }
                Ok(())
            }
            DiagnosticRequest::Traceroute { host } => validate_host("host", host),
            DiagnosticRequest::Nmap { host, options } => {
                validate_host("host", host)?;
                options.iter().try_for_each(|opt| validate_nmap_option(opt))
            }
        }
    }

    /// Build the argv for this diagnostic (does not validate)
    pub fn to_invocation(&self) -> Invocation {
        match self {
            DiagnosticRequest::Dig {
                domain,
                record_type,
            } => Invocation::new("dig")
                .arg(domain.as_str())
                .arg(record_type.as_str()),
            DiagnosticRequest::Ping { host, count } => Invocation::new("ping")
                .arg("-c")
                .arg(count.to_string())
                .arg(host.as_str()),
            DiagnosticRequest::Traceroute { host } => {
                Invocation::new("traceroute").arg(host.as_str())
            }
            DiagnosticRequest::Nmap { host, options } => Invocation::new("nmap")
                .args(options.iter().cloned())
                .arg(host.as_str()),
            DiagnosticRequest::Whois { domain } => Invocation::new("whois").arg(domain.as_str()),
        }
    }
}

/// Accept an IP literal or a hostname made of DNS labels
fn validate_host(name: &'static str, host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(DomainError::MissingParameter(name));
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    if host.len() > MAX_HOST_LEN {
        return Err(DomainError::InvalidHost(format!(
            "longer than {} characters",
            MAX_HOST_LEN
        )));
    }

    let trimmed = host.strip_suffix('.').unwrap_or(host);
    for label in trimmed.split('.') {
        let valid = !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DomainError::InvalidHost(host.to_string()));
        }
    }
    Ok(())
}

fn validate_nmap_option(option: &str) -> Result<()> {
    let allowed_chars = option
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ',' | '=' | '.' | ':'));
    if option.is_empty() || !allowed_chars {
        return Err(DomainError::InvalidOption(option.to_string()));
    }
    if NMAP_DENIED_PREFIXES
        .iter()
        .any(|prefix| option.starts_with(prefix))
    {
        return Err(DomainError::InvalidOption(option.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dig_invocation_defaults_to_a_record() {
        let req = DiagnosticRequest::Dig {
            domain: "example.com".to_string(),
            record_type: RecordType::default(),
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.to_invocation().to_string(), "dig example.com A");
    }

    #[test]
    fn test_record_type_parse_case_insensitive() {
        assert_eq!("mx".parse::<RecordType>().unwrap(), RecordType::Mx);
        assert_eq!("AAAA".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!(matches!(
            "BOGUS".parse::<RecordType>(),
            Err(DomainError::InvalidRecordType(_))
        ));
    }

    #[test]
    fn test_ping_invocation() {
        let req = DiagnosticRequest::Ping {
            host: "10.0.0.1".to_string(),
            count: DEFAULT_PING_COUNT,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.to_invocation().to_string(), "ping -c 4 10.0.0.1");
    }

    #[test]
    fn test_ping_count_out_of_range() {
        let req = DiagnosticRequest::Ping {
            host: "example.com".to_string(),
            count: 0,
        };
        assert!(matches!(
            req.validate(),
            Err(DomainError::OutOfRange { name: "count", .. })
        ));
    }

    #[test]
    fn test_missing_host_rejected() {
        let req = DiagnosticRequest::Traceroute {
            host: String::new(),
        };
        assert_eq!(req.validate(), Err(DomainError::MissingParameter("host")));
    }

    #[test]
    fn test_shell_metacharacters_rejected() {
        for host in [
            "example.com; rm -rf /",
            "$(id)",
            "a b",
            "-oX",
            "host`x`",
            "exa_mple..com",
        ] {
            let req = DiagnosticRequest::Whois {
                domain: host.to_string(),
            };
            assert!(req.validate().is_err(), "{host} should be rejected");
        }
    }

    #[test]
    fn test_ipv6_and_srv_names_accepted() {
        for host in ["::1", "2001:db8::1", "_sip._tcp.example.com", "example.com."] {
            let req = DiagnosticRequest::Traceroute {
                host: host.to_string(),
            };
            assert!(req.validate().is_ok(), "{host} should be accepted");
        }
    }

    #[test]
    fn test_nmap_options_validated() {
        let ok = DiagnosticRequest::Nmap {
            host: "scanme.nmap.org".to_string(),
            options: DiagnosticRequest::split_options("-p 22,80 -T4 --top-ports 10"),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(
            ok.to_invocation().to_string(),
            "nmap -p 22,80 -T4 --top-ports 10 scanme.nmap.org"
        );

        for bad in ["-oN out.txt", "--script=vuln", "-iL targets", "-p 80|sh"] {
            let req = DiagnosticRequest::Nmap {
                host: "scanme.nmap.org".to_string(),
                options: DiagnosticRequest::split_options(bad),
            };
            assert!(
                matches!(req.validate(), Err(DomainError::InvalidOption(_))),
                "{bad} should be rejected"
            );
        }
    }
}
