//! Error types for kvattr

use std::time::Duration;
use thiserror::Error;

/// Result type alias for kvattr operations
pub type Result<T> = std::result::Result<T, KvAttrError>;

/// Unified error type for all kvattr operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KvAttrError {
    /// Malformed or incomplete pool configuration, or a schema misdeclaration.
    /// Fatal at setup time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    /// Attribute kind outside {string, integer}
    #[error("Unsupported type: {0}, only `string` and `integer` are supported")]
    UnsupportedType(String),

    /// Pool checkout exceeded the configured timeout - retryable
    #[error("Pool '{pool}' checkout timed out after {timeout:?}")]
    PoolTimeout { pool: String, timeout: Duration },

    /// Backend communication failure - retryable
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Identity field has no value, so no backend key can be built
    #[error("Missing identity: field '{0}' has no value")]
    MissingIdentity(String),

    /// A host callback (before/after save, touch) failed
    #[error("Hook error: {0}")]
    Hook(String),
}

impl KvAttrError {
    /// Returns true if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KvAttrError::PoolTimeout { .. } | KvAttrError::Transport(_)
        )
    }

    /// Returns true if this error can only come from setup (configuration or declaration)
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            KvAttrError::Configuration(_) | KvAttrError::UnsupportedType(_)
        )
    }
}

impl From<serde_json::Error> for KvAttrError {
    fn from(err: serde_json::Error) -> Self {
        KvAttrError::Configuration(format!("invalid JSON pool configuration: {}", err))
    }
}

impl From<serde_yaml::Error> for KvAttrError {
    fn from(err: serde_yaml::Error) -> Self {
        KvAttrError::Configuration(format!("invalid YAML pool configuration: {}", err))
    }
}

// Redis driver error conversion (when redis-errors feature is enabled)
#[cfg(feature = "redis-errors")]
impl From<redis::RedisError> for KvAttrError {
    fn from(err: redis::RedisError) -> Self {
        KvAttrError::Transport(err.to_string())
    }
}
