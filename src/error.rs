//! Error types for the proxy cache core
//!
//! - [`TransportError`]: what the transport collaborator reports for a failed
//!   call, with connectivity classification for remote health tracking
//! - [`RemoteError`]: outcome of a call gated by the remote health controller
//! - [`ConfigError`]: invalid repository configuration, raised at construction
//! - [`ProxyError`]: failure of a proxied GET with no cached content to fall back on

use std::io::ErrorKind;

use thiserror::Error;

use crate::types::ValidationError;

/// Errors reported by the transport collaborator
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// TCP connection could not be established
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    /// DNS resolution failed
    #[error("failed to resolve {host}")]
    Dns { host: String },

    /// The call did not complete in time
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The peer reset the connection mid-call
    #[error("connection reset by {host}")]
    ConnectionReset { host: String },

    /// Raw I/O error from the transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Application-level status surfaced as an error
    #[error("remote returned status {code}")]
    Status { code: u16 },

    /// Application-level failure the caller wants treated as unreachability
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Report an application-level failure as a connectivity failure
    #[must_use]
    pub fn connectivity(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Whether this error means the remote endpoint itself is unreachable
    ///
    /// Only these errors change remote health. Application-level statuses are
    /// the caller's concern.
    #[must_use]
    pub fn is_connectivity_error(&self) -> bool {
        match self {
            Self::Connect { .. }
            | Self::Dns { .. }
            | Self::Timeout { .. }
            | Self::ConnectionReset { .. }
            | Self::Unavailable(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::TimedOut
                    | ErrorKind::BrokenPipe
                    | ErrorKind::AddrNotAvailable
                    | ErrorKind::HostUnreachable
                    | ErrorKind::NetworkUnreachable
            ),
            Self::Status { .. } | Self::Other(_) => false,
        }
    }

    /// Short human-readable reason recorded on the remote status
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Connect { .. } | Self::ConnectionReset { .. } => "Connection refused".to_owned(),
            Self::Dns { .. } => "Unknown host".to_owned(),
            Self::Timeout { .. } => "Timeout".to_owned(),
            Self::Io(e) if e.kind() == ErrorKind::TimedOut => "Timeout".to_owned(),
            Self::Io(e) => e.kind().to_string(),
            Self::Unavailable(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Log level appropriate for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.is_connectivity_error() {
            tracing::Level::WARN
        } else {
            tracing::Level::DEBUG
        }
    }
}

/// Outcome of a call refused or failed behind the remote health gate
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    /// An administrator took the remote offline
    #[error("remote is offline")]
    Offline,

    /// An administrator blocked the remote
    #[error("remote is blocked")]
    Blocked,

    /// Remote is auto-blocked after a connectivity failure
    #[error("remote is auto-blocked until {until}")]
    AutoBlocked {
        /// End of the block window, millis since epoch
        until: u64,
    },

    /// The call was attempted and failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RemoteError {
    /// Whether the call was refused without being attempted
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Offline | Self::Blocked | Self::AutoBlocked { .. }
        )
    }
}

/// Invalid repository configuration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("negative cache time-to-live cannot be negative (got {0}s)")]
    NegativeCacheTtl(i64),

    #[error("auto-block window must be greater than zero")]
    ZeroAutoBlockWindow,

    #[error("auto-block max window ({max}s) is shorter than the initial window ({initial}s)")]
    AutoBlockWindowOrder { initial: u64, max: u64 },

    #[error("invalid remote URL '{url}': {reason}")]
    InvalidRemoteUrl { url: String, reason: String },
}

/// A proxied request failed and no cached content could be served instead
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProxyError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The origin answered with a status that is neither content nor a negative answer
    #[error("remote returned status {code} for {path}")]
    UnexpectedStatus { code: u16, path: String },

    /// Only GET requests go through the caches
    #[error("{0} requests are not served from cache; use passthrough")]
    NotCacheable(String),

    /// The storage collaborator failed
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn connectivity_variants() {
        assert!(
            TransportError::Connect {
                host: "repo.example.com".into(),
                reason: "refused".into()
            }
            .is_connectivity_error()
        );
        assert!(TransportError::Dns { host: "x".into() }.is_connectivity_error());
        assert!(TransportError::Timeout { url: "x".into() }.is_connectivity_error());
        assert!(TransportError::ConnectionReset { host: "x".into() }.is_connectivity_error());
        assert!(TransportError::connectivity("proxy said 502").is_connectivity_error());
    }

    #[test]
    fn status_errors_are_not_connectivity() {
        assert!(!TransportError::Status { code: 500 }.is_connectivity_error());
        assert!(!TransportError::Status { code: 404 }.is_connectivity_error());
        assert!(!TransportError::Other("bad body".into()).is_connectivity_error());
    }

    #[test]
    fn io_errors_classified_by_kind() {
        let refused: TransportError =
            std::io::Error::new(ErrorKind::ConnectionRefused, "refused").into();
        assert!(refused.is_connectivity_error());

        let timed_out: TransportError = std::io::Error::new(ErrorKind::TimedOut, "slow").into();
        assert!(timed_out.is_connectivity_error());
        assert_eq!(timed_out.reason(), "Timeout");

        let invalid: TransportError = std::io::Error::new(ErrorKind::InvalidData, "gzip").into();
        assert!(!invalid.is_connectivity_error());
    }

    #[test]
    fn io_error_source_is_preserved() {
        let err: TransportError = std::io::Error::other("boom").into();
        assert!(err.source().is_some());
    }

    #[test]
    fn log_level_follows_classification() {
        assert_eq!(
            TransportError::Timeout { url: "x".into() }.log_level(),
            tracing::Level::WARN
        );
        assert_eq!(
            TransportError::Status { code: 503 }.log_level(),
            tracing::Level::DEBUG
        );
    }

    #[test]
    fn remote_error_rejections() {
        assert!(RemoteError::Offline.is_rejection());
        assert!(RemoteError::Blocked.is_rejection());
        assert!(RemoteError::AutoBlocked { until: 1 }.is_rejection());
        assert!(!RemoteError::Transport(TransportError::Status { code: 500 }).is_rejection());
    }

    #[test]
    fn config_error_messages() {
        let err = ConfigError::AutoBlockWindowOrder {
            initial: 60,
            max: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("60"));
        assert!(msg.contains("30"));

        assert!(ConfigError::NegativeCacheTtl(-5).to_string().contains("-5"));
    }
}
