/// Unified error handling for the rumbo query router
///
/// Covers the routing error taxonomy: selection misses, replica and
/// primary execution failures, timeouts, and configuration rejection.
use crate::config::ConfigError;
use thiserror::Error;

/// Boxed error produced by an operation closure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for router operations
#[derive(Debug, Error)]
pub enum RouterError {
    /// The selector found no routable replica. Not fatal when primary
    /// fallback is enabled.
    #[error("no routable replica endpoint available")]
    EndpointUnavailable,

    /// An operation failed or timed out against a replica. Recoverable
    /// via retry or primary fallback.
    #[error("replica execution failed on {endpoint}: {source}")]
    ReplicaExecutionFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// An operation failed or timed out against the primary. Always fatal.
    #[error("primary execution failed: {source}")]
    PrimaryExecutionFailed {
        #[source]
        source: BoxError,
    },

    /// Invalid endpoint registration or settings file
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// An attempt that exceeded its deadline. Used as the source error of
/// `ReplicaExecutionFailed`/`PrimaryExecutionFailed` for timed-out
/// operations, which count as plain failures for health and stats.
#[derive(Debug, Error)]
#[error("operation timed out after {timeout_ms}ms")]
pub struct QueryTimeout {
    pub timeout_ms: u64,
}

/// Result type alias for router operations
pub type RouterResult<T> = Result<T, RouterError>;

impl RouterError {
    /// Create a replica execution error
    pub fn replica<S: Into<String>>(endpoint: S, source: BoxError) -> Self {
        RouterError::ReplicaExecutionFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a primary execution error
    pub fn primary(source: BoxError) -> Self {
        RouterError::PrimaryExecutionFailed { source }
    }

    /// Create a replica timeout error
    pub fn replica_timeout<S: Into<String>>(endpoint: S, timeout_ms: u64) -> Self {
        RouterError::ReplicaExecutionFailed {
            endpoint: endpoint.into(),
            source: Box::new(QueryTimeout { timeout_ms }),
        }
    }

    /// Create a primary timeout error
    pub fn primary_timeout(timeout_ms: u64) -> Self {
        RouterError::PrimaryExecutionFailed {
            source: Box::new(QueryTimeout { timeout_ms }),
        }
    }

    /// Check if this error is recoverable through retry or fallback
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::EndpointUnavailable => true,
            RouterError::ReplicaExecutionFailed { .. } => true,
            RouterError::PrimaryExecutionFailed { .. } => false,
            RouterError::Config(_) => false,
        }
    }
}
