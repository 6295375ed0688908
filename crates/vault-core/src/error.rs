//! Error types for temporal-vault operations.
//!
//! Structured error hierarchy with error codes for programmatic handling.
//! Cache failures are deliberately non-fatal: callers log them and fall
//! back to the storage path.

use thiserror::Error;

/// Result type alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Main error type for all vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// No qualifying version or record. Surfaced to callers as a client error.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        record_id: Option<String>,
    },

    /// A stored version label does not match the `v<integer>` pattern.
    /// Indicates chain corruption; never auto-repaired.
    #[error("Malformed version label: {label}")]
    MalformedVersionLabel { label: String },

    /// Storage operation failed.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A concurrent writer changed affected rows between scan and apply.
    /// Retryable within the engine's retry budget.
    #[error("Storage conflict: {message}")]
    Conflict { message: String },

    /// Cache backend unavailable. Never fatal to the underlying operation.
    #[error("Cache unavailable: {message}")]
    CacheUnavailable { message: String },

    /// Parse error (timestamps, stored row contents).
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Record (REC_xxx)
    RecNotFound,
    RecNoVersionAtTime,

    // Version chain (VER_xxx)
    VerMalformedLabel,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbConflict,

    // Cache (CACHE_xxx)
    CacheUnavailable,

    // Parse (PARSE_xxx)
    ParseInvalidTimestamp,
    ParseInvalidJson,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RecNotFound => "REC_001",
            ErrorCode::RecNoVersionAtTime => "REC_002",
            ErrorCode::VerMalformedLabel => "VER_001",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbConflict => "DB_003",
            ErrorCode::CacheUnavailable => "CACHE_001",
            ErrorCode::ParseInvalidTimestamp => "PARSE_001",
            ErrorCode::ParseInvalidJson => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl VaultError {
    /// Create a not-found error for a record.
    pub fn record_not_found(record_id: impl Into<String>) -> Self {
        let id = record_id.into();
        Self::NotFound {
            message: "Record not found".to_string(),
            code: ErrorCode::RecNotFound,
            record_id: Some(id),
        }
    }

    /// Create a not-found error with a custom message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: ErrorCode::RecNotFound,
            record_id: None,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            message: message.into(),
        }
    }

    /// Create a timestamp parse error.
    pub fn parse_timestamp(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidTimestamp,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::MalformedVersionLabel { .. } => ErrorCode::VerMalformedLabel,
            Self::Storage { code, .. } => *code,
            Self::Conflict { .. } => ErrorCode::DbConflict,
            Self::CacheUnavailable { .. } => ErrorCode::CacheUnavailable,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether retrying the operation may succeed. Covers logical
    /// conflicts and transient storage states (busy/locked, connection
    /// failures).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::Storage {
                    code: ErrorCode::DbConflict | ErrorCode::DbConnectionFailed,
                    ..
                }
        )
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                ErrorCode::DbConflict
            }
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::CannotOpen =>
            {
                ErrorCode::DbConnectionFailed
            }
            _ => ErrorCode::DbOperationFailed,
        };
        Self::Storage {
            message: err.to_string(),
            code,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found() {
        let err = VaultError::record_not_found("rec-1");
        assert_eq!(err.code(), ErrorCode::RecNotFound);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Record not found"));
    }

    #[test]
    fn test_malformed_label_code() {
        let err = VaultError::MalformedVersionLabel {
            label: "version-7".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::VerMalformedLabel);
        assert!(err.to_string().contains("version-7"));
    }

    #[test]
    fn test_conflict_is_retryable() {
        assert!(VaultError::conflict("rows changed").is_retryable());
        assert!(!VaultError::storage("disk full").is_retryable());
    }

    #[test]
    fn test_busy_database_error_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err: VaultError = busy.into();
        assert_eq!(err.code(), ErrorCode::DbConflict);
        assert!(err.is_retryable());

        let locked = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        );
        let err: VaultError = locked.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::RecNotFound.as_str(), "REC_001");
        assert_eq!(ErrorCode::DbConflict.as_str(), "DB_003");
    }
}
