/// Unified error handling for vigia
///
/// Reconciliation never raises: membership anomalies are absorbed by removing
/// the offending member from the tracked view. What reaches callers is the
/// absence of a usable description within a deadline, a closed cluster, or
/// bad input (addresses and configuration).

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Main error type for cluster operations
#[derive(Debug, Error)]
pub enum ClusterError {
    /// No published description satisfied the caller's predicate in time
    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        timeout: Duration,
    },

    /// The cluster was closed before or while waiting
    #[error("Cluster has been closed")]
    Closed,

    /// A host string could not be turned into a server address
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

impl ClusterError {
    /// Create a timeout error
    pub fn timeout<S: Into<String>>(waiting_for: S, timeout: Duration) -> Self {
        ClusterError::Timeout {
            waiting_for: waiting_for.into(),
            timeout,
        }
    }

    /// Create an invalid address error
    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        ClusterError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        ClusterError::Config(ConfigError::ValidationError(message.into()))
    }

    /// Check if this error is recoverable (the caller may retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClusterError::Timeout { .. })
    }

    /// Check if this error is the timeout condition
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClusterError::Timeout { .. })
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ClusterError::Config(_) => ErrorSeverity::Critical,
            ClusterError::InvalidAddress { .. } => ErrorSeverity::Error,
            ClusterError::Timeout { .. } => ErrorSeverity::Warning,
            ClusterError::Closed => ErrorSeverity::Info,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about expected conditions
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ClusterError::timeout("a primary", Duration::from_millis(50));
        assert!(matches!(error, ClusterError::Timeout { .. }));
        assert_eq!(
            error.to_string(),
            "Timed out after 50ms waiting for a primary"
        );

        let error = ClusterError::invalid_address("host:abc", "invalid port");
        assert_eq!(
            error.to_string(),
            "Invalid server address 'host:abc': invalid port"
        );
    }

    #[test]
    fn test_error_severity() {
        let config_error = ClusterError::Config(ConfigError::ValidationError("test".to_string()));
        assert_eq!(config_error.severity(), ErrorSeverity::Critical);

        let timeout = ClusterError::timeout("anything", Duration::from_secs(1));
        assert_eq!(timeout.severity(), ErrorSeverity::Warning);
        assert_eq!(ClusterError::Closed.severity(), ErrorSeverity::Info);
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_error_recoverability() {
        let timeout = ClusterError::timeout("anything", Duration::from_secs(1));
        assert!(timeout.is_recoverable());
        assert!(timeout.is_timeout());

        assert!(!ClusterError::Closed.is_recoverable());
        assert!(!ClusterError::validation("bad").is_recoverable());
    }
}
