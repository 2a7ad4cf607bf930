use std::time::Duration;

use thiserror::Error;

/// Errors raised by a single probe attempt.
///
/// None of these are fatal: the scheduler logs them and records a zero gauge.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no {family} address found for host {host}")]
    NoAddress { host: String, family: &'static str },

    /// Raw ICMP sockets need CAP_NET_RAW (or root / Administrator).
    #[error(
        "insufficient privilege to open an ICMP socket ({source}); \
         run as root, grant CAP_NET_RAW, or use --icmp-mode dgram|system"
    )]
    InsufficientPrivilege {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open ICMP socket: {0}")]
    Socket(std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("icmp error: {0}")]
    Icmp(String),

    #[error("ping exited: {0}")]
    PingExited(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProbeError {
    /// Classifies a socket creation error, separating permission failures.
    pub fn from_socket(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            ProbeError::InsufficientPrivilege { source: err }
        } else {
            ProbeError::Socket(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_maps_to_privilege_error() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let probe_err = ProbeError::from_socket(err);
        assert!(matches!(probe_err, ProbeError::InsufficientPrivilege { .. }));
        assert!(probe_err.to_string().contains("CAP_NET_RAW"));
    }

    #[test]
    fn other_socket_errors_stay_generic() {
        let err = std::io::Error::from(std::io::ErrorKind::AddrNotAvailable);
        assert!(matches!(ProbeError::from_socket(err), ProbeError::Socket(_)));
    }
}
