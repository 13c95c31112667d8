//! Dismissible, auto-expiring feedback for alert mutations.
//!
//! After a create, update, or delete the caller gets a [`Feedback`] telling
//! the user what happened. Failures carry a [`FailureCause`] so the message
//! can distinguish a permission problem from a conflict, rate limiting, a
//! server fault, or a network fault.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::client::ApiError;

/// How long a feedback message stays visible.
pub const DEFAULT_TTL_SECONDS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Success,
    Error,
}

/// Why an alert mutation failed, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    Validation,
    Permission,
    NotFound,
    Conflict,
    RateLimited,
    Server,
    Network,
}

impl From<&ApiError> for FailureCause {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Validation { .. } => FailureCause::Validation,
            ApiError::Auth { .. } => FailureCause::Permission,
            ApiError::NotFound { .. } => FailureCause::NotFound,
            ApiError::Conflict { .. } => FailureCause::Conflict,
            ApiError::RateLimit { .. } => FailureCause::RateLimited,
            ApiError::Server { .. } | ApiError::InvalidResponse { .. } => FailureCause::Server,
            ApiError::Network { .. } | ApiError::Timeout { .. } => FailureCause::Network,
        }
    }
}

/// A user-facing status message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub kind: FeedbackKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,

    pub message: String,

    pub expires_at: DateTime<Utc>,
}

impl Feedback {
    pub fn success(message: &str, now: DateTime<Utc>) -> Self {
        Self {
            kind: FeedbackKind::Success,
            cause: None,
            message: message.to_string(),
            expires_at: now + Duration::seconds(DEFAULT_TTL_SECONDS),
        }
    }

    pub fn failure(err: &ApiError, now: DateTime<Utc>) -> Self {
        let cause = FailureCause::from(err);
        let message = match cause {
            // Transport errors are not meaningful to a user.
            FailureCause::Network => {
                "Network error. Check your connection and try again.".to_string()
            }
            _ => err.message().to_string(),
        };

        Self {
            kind: FeedbackKind::Error,
            cause: Some(cause),
            message,
            expires_at: now + Duration::seconds(DEFAULT_TTL_SECONDS),
        }
    }

    /// Whether the message should no longer be shown.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
