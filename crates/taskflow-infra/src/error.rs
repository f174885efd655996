//! Client-facing error responses
//!
//! Transport adapters live outside this workspace; they serialize
//! [`ErrorResponse`] and use [`ErrorMetadata::http_status_code`] for the status.

use serde::Serialize;
use taskflow_core::{AppError, ErrorMetadata, LogLevel};

/// Standard error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Structured authorization decision, present for denials only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Build the body for `err`. Details are withheld in production and for sensitive errors.
    pub fn from_app_error(err: &AppError, production: bool) -> Self {
        let expose = !production && !err.is_sensitive();
        let decision = match err {
            AppError::Denied(decision) => serde_json::to_value(decision.as_ref()).ok(),
            _ => None,
        };

        Self {
            error: err.client_message(),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(String::from),
            decision,
        }
    }
}

/// Log `err` at the level its metadata asks for.
pub fn log_app_error(err: &AppError) {
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(error = %err, code, "Request failed"),
        LogLevel::Warn => tracing::warn!(error = %err, code, "Request failed"),
        LogLevel::Error => tracing::error!(
            error = %err,
            details = %err.detailed_message(),
            code,
            "Request failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::models::{AuthorizationDecision, DenialReason};
    use uuid::Uuid;

    #[test]
    fn test_denial_response_carries_decision() {
        let err = AppError::from(AuthorizationDecision::deny(DenialReason::NotSubordinate));
        let response = ErrorResponse::from_app_error(&err, true);

        assert_eq!(response.code, "AUTHORIZATION_DENIED");
        assert!(!response.recoverable);
        assert!(response.error.contains("não é subordinado"));
        assert!(response.details.is_none());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["decision"]["reason"]["code"], "NOT_SUBORDINATE");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_store_errors_hide_details_outside_production() {
        let err = AppError::Store("connection reset".to_string());
        let response = ErrorResponse::from_app_error(&err, false);

        assert_eq!(response.code, "STORE_UNAVAILABLE");
        assert!(response.recoverable);
        assert!(response.details.is_none());
        assert!(!response.error.contains("connection reset"));
    }

    #[test]
    fn test_development_response_includes_details() {
        let err = AppError::VersionConflict {
            task_id: Uuid::new_v4(),
            expected: 1,
            actual: 3,
        };
        let response = ErrorResponse::from_app_error(&err, false);

        assert_eq!(response.code, "VERSION_CONFLICT");
        assert_eq!(response.error_type.as_deref(), Some("VersionConflict"));
        assert!(response.details.unwrap().contains("found 3"));
        assert!(response.decision.is_none());
    }
}
