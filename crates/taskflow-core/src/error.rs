//! Error types module
//!
//! All failures raised by Taskflow services are unified under [`AppError`].
//! Authorization *decisions* are not errors: `authorize_*` calls return an
//! [`AuthorizationDecision`](crate::models::AuthorizationDecision) value, and only
//! mutating orchestrator calls wrap a negative decision in [`AppError::Denied`].
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::AuthorizationDecision;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like contention
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to a caller.
pub trait ErrorMetadata {
    /// HTTP status code a transport layer should use
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "VERSION_CONFLICT")
    fn error_code(&self) -> &'static str;

    /// Whether the caller may retry the operation after re-fetching
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// A hierarchy mutation that would corrupt the superior graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    #[error("moving user {user_id} under {superior_id} would create a cycle")]
    CycleDetected { user_id: Uuid, superior_id: Uuid },

    #[error("user {0} cannot be its own superior")]
    SelfSuperior(Uuid),

    #[error("user {user_id} is a root with {subordinates} subordinate(s); a replacement superior is required")]
    OrphanedSubtree { user_id: Uuid, subordinates: usize },

    #[error("{kind} {id} does not exist")]
    MissingEntity { kind: &'static str, id: Uuid },

    #[error("user {other_id} does not belong to the same company as {user_id}")]
    CrossCompany { user_id: Uuid, other_id: Uuid },

    #[error("superior {0} is not active")]
    InactiveSuperior(Uuid),

    #[error("user {0} is already inactive")]
    AlreadyInactive(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Hierarchy integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),

    #[error("Denied: {}", .0.reason_text().unwrap_or_default())]
    Denied(Box<AuthorizationDecision>),

    #[error("Version conflict on task {task_id}: expected {expected}, found {actual}")]
    VersionConflict {
        task_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Resource {resource} is locked by {holder}")]
    ResourceLocked { resource: String, holder: Uuid },

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

impl From<AuthorizationDecision> for AppError {
    fn from(decision: AuthorizationDecision) -> Self {
        AppError::Denied(Box::new(decision))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) | AppError::Store(_) => (
            503,
            "STORE_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check that the account is active"),
            false,
            LogLevel::Debug,
        ),
        AppError::Integrity(_) => (
            422,
            "HIERARCHY_INTEGRITY_VIOLATION",
            false,
            Some("Choose a different superior or specify a replacement"),
            false,
            LogLevel::Warn,
        ),
        AppError::Denied(_) => (
            403,
            "AUTHORIZATION_DENIED",
            false,
            Some("Request approval from a superior with the required permission"),
            false,
            LogLevel::Debug,
        ),
        AppError::VersionConflict { .. } => (
            409,
            "VERSION_CONFLICT",
            true,
            Some("Re-fetch the task and retry with the current version"),
            false,
            LogLevel::Debug,
        ),
        AppError::ResourceLocked { .. } => (
            423,
            "RESOURCE_LOCKED",
            true,
            Some("Retry after the other user finishes"),
            false,
            LogLevel::Debug,
        ),
        AppError::ConcurrentModification(_) => (
            409,
            "CONCURRENT_MODIFICATION",
            true,
            Some("Re-fetch and retry the operation"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Store(_) => "Store",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Integrity(_) => "IntegrityViolation",
            AppError::Denied(_) => "AuthorizationDenied",
            AppError::VersionConflict { .. } => "VersionConflict",
            AppError::ResourceLocked { .. } => "ResourceLocked",
            AppError::ConcurrentModification(_) => "ConcurrentModification",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// True for the retryable concurrency family (version, lock, precondition).
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            AppError::VersionConflict { .. }
                | AppError::ResourceLocked { .. }
                | AppError::ConcurrentModification(_)
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Store(_) => "Failed to access data store".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Integrity(ref violation) => violation.to_string(),
            AppError::Denied(ref decision) => decision
                .reason_text()
                .unwrap_or_else(|| "Operation not permitted".to_string()),
            AppError::VersionConflict { .. } => {
                "The task was modified by someone else; reload and try again".to_string()
            }
            AppError::ResourceLocked { .. } => {
                "This item is being modified by another user".to_string()
            }
            AppError::ConcurrentModification(_) => {
                "The records changed while the operation was running".to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DenialReason;

    #[test]
    fn test_error_metadata_version_conflict() {
        let err = AppError::VersionConflict {
            task_id: Uuid::new_v4(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "VERSION_CONFLICT");
        assert!(err.is_recoverable());
        assert!(err.is_concurrency_conflict());
        assert!(!err.is_sensitive());
    }

    #[test]
    fn test_error_metadata_integrity() {
        let user_id = Uuid::new_v4();
        let err = AppError::from(IntegrityViolation::SelfSuperior(user_id));
        assert_eq!(err.http_status_code(), 422);
        assert!(!err.is_recoverable());
        assert!(!err.is_concurrency_conflict());
        assert!(err.client_message().contains(&user_id.to_string()));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_denied_carries_reason_text() {
        let decision = AuthorizationDecision::deny(DenialReason::NotSubordinate);
        let err = AppError::from(decision);
        assert_eq!(err.http_status_code(), 403);
        assert!(err.client_message().contains("não é subordinado"));
        assert!(err.to_string().contains("não é subordinado"));
    }

    #[test]
    fn test_store_errors_are_sensitive() {
        let err = AppError::Store("connection reset".to_string());
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access data store");
        assert_eq!(err.log_level(), LogLevel::Error);
    }
}
