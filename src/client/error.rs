//! Error classification for the alert-subscription backend.
//!
//! Every failed call ends up as one [`ApiError`]. Only [`ApiError::Server`] and
//! [`ApiError::Network`] are retried; the rest cannot succeed on a second try.

use reqwest::StatusCode;
use serde::Deserialize;

/// Result type for alert API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error type for alert API operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request was rejected as malformed (400, other 4xx, or local validation).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Missing or rejected credentials (401, 403).
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// The alert does not exist (404).
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The request conflicts with existing state (409).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The backend is throttling this client (429).
    #[error("Rate limited: {message}")]
    RateLimit { message: String },

    /// The backend failed (5xx). Retryable.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No response was received. Retryable.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// A success response whose body did not have the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

/// Error body convention of the backend: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    /// Classify a non-2xx response.
    ///
    /// The backend's `detail` string is surfaced verbatim when present;
    /// otherwise a generic message for the class is used.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = extract_detail(body);
        let message = |generic: &str| detail.clone().unwrap_or_else(|| generic.to_string());

        match status.as_u16() {
            400 => ApiError::Validation {
                message: message("Invalid request"),
            },
            401 => ApiError::Auth {
                message: message("You must be logged in"),
            },
            403 => ApiError::Auth {
                message: message("You do not have permission to perform this action"),
            },
            404 => ApiError::NotFound {
                message: message("Alert not found"),
            },
            409 => ApiError::Conflict {
                message: message("An alert with these settings already exists"),
            },
            429 => ApiError::RateLimit {
                message: message("Too many requests"),
            },
            code @ 400..=499 => ApiError::Validation {
                message: message(&format!("Request rejected ({code})")),
            },
            code => ApiError::Server {
                status: code,
                message: message("Server error"),
            },
        }
    }

    /// Classify a transport failure where no response was received.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }

    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. } | ApiError::Network { .. })
    }

    /// The message without the class prefix, suitable for showing to a user.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation { message }
            | ApiError::Auth { message }
            | ApiError::NotFound { message }
            | ApiError::Conflict { message }
            | ApiError::RateLimit { message }
            | ApiError::Server { message, .. }
            | ApiError::Network { message }
            | ApiError::Timeout { message }
            | ApiError::InvalidResponse { message } => message,
        }
    }
}

/// Pull a `detail` string out of an error body.
///
/// Non-string details (e.g. lists of field errors) are rendered as JSON.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_statuses() {
        let cases = [
            (400, "Validation"),
            (401, "Auth"),
            (403, "Auth"),
            (404, "NotFound"),
            (409, "Conflict"),
            (422, "Validation"),
            (429, "RateLimit"),
            (500, "Server"),
            (503, "Server"),
        ];

        for (code, expected) in cases {
            let err = ApiError::from_response(StatusCode::from_u16(code).unwrap(), "");
            let name = match err {
                ApiError::Validation { .. } => "Validation",
                ApiError::Auth { .. } => "Auth",
                ApiError::NotFound { .. } => "NotFound",
                ApiError::Conflict { .. } => "Conflict",
                ApiError::RateLimit { .. } => "RateLimit",
                ApiError::Server { .. } => "Server",
                _ => "other",
            };
            assert_eq!(name, expected, "status {code}");
        }
    }

    #[test]
    fn test_detail_surfaced_verbatim() {
        let err = ApiError::from_response(
            StatusCode::CONFLICT,
            r#"{"detail": "Alert for Delhi above 150 already exists"}"#,
        );
        assert_eq!(err.message(), "Alert for Delhi above 150 already exists");

        let err = ApiError::from_response(StatusCode::BAD_REQUEST, r#"{"detail": "bad threshold"}"#);
        assert_eq!(
            err,
            ApiError::Validation {
                message: "bad threshold".to_string()
            }
        );
    }

    #[test]
    fn test_generic_messages_without_detail() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(err.message(), "You must be logged in");

        let err = ApiError::from_response(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert_eq!(err.message(), "Too many requests");

        let err = ApiError::from_response(StatusCode::BAD_GATEWAY, r#"{"detail": ""}"#);
        assert_eq!(err.message(), "Server error");
    }

    #[test]
    fn test_structured_detail_rendered() {
        let err = ApiError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "threshold"], "msg": "too large"}]}"#,
        );
        assert!(err.message().contains("too large"));
    }

    #[test]
    fn test_retry_scope() {
        assert!(
            ApiError::Server {
                status: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            ApiError::Network {
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ApiError::validation("x").is_retryable());
        assert!(
            !ApiError::Timeout {
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::RateLimit {
                message: String::new()
            }
            .is_retryable()
        );
    }
}
