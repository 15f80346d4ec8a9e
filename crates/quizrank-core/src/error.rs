//! Error taxonomy.
//!
//! Fatal failures (`ApiError`, `StoreError`, exhausted retries) unwind to the
//! course-level sync call. `TitleError` and `SkipReason` are expected
//! outcomes that exclude a quiz or a submission and are only counted.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the LMS API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("{endpoint}: API error (HTTP {status}): {message}")]
    Status {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// The API returned a 429 rate limit response.
    #[error("{endpoint}: rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        endpoint: String,
        retry_after_secs: u64,
    },

    /// The request timed out.
    #[error("{endpoint}: request timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    /// A network error occurred.
    #[error("{endpoint}: network error: {message}")]
    Network { endpoint: String, message: String },

    /// The response body did not match the expected shape.
    #[error("{endpoint}: failed to decode response: {message}")]
    Decode { endpoint: String, message: String },

    /// The server kept handing out `next` links past the page cap.
    #[error("{endpoint}: pagination exceeded {pages} pages")]
    Pagination { endpoint: String, pages: u32 },

    /// The client could not be constructed.
    #[error("client setup failed: {0}")]
    Setup(String),
}

impl ApiError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status < 500,
            ApiError::Decode { .. } | ApiError::Pagination { .. } | ApiError::Setup(_) => true,
            ApiError::RateLimited { .. } | ApiError::Timeout { .. } | ApiError::Network { .. } => {
                false
            }
        }
    }

    /// Returns the server's retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    /// HTTP status, for the variants that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

/// Errors raised by a persistence gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    /// A row the caller just upserted is gone.
    #[error("{kind} '{key}' not found")]
    MissingRow { kind: &'static str, key: String },
}

/// Why a quiz title was rejected. The quiz is left out of the sync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TitleError {
    #[error("no [TYPE] tags at the start of the title")]
    NoTypeTags,

    #[error("difficulty '{0}' is not a finite number")]
    InvalidDifficulty(String),

    #[error("class '{0}' is not a non-negative integer")]
    InvalidClass(String),
}

/// Why a submission was skipped without being rated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Workflow state is not `complete`.
    NotComplete,
    /// No finish time recorded.
    NotFinished,
    /// Score or max score missing (or not finite).
    Unscored,
    /// Max score is zero, so no accuracy can be computed.
    ZeroMaxScore,
    /// An attempt for this (student, quiz) pair is already recorded.
    Duplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::NotComplete => "not complete",
            SkipReason::NotFinished => "not finished",
            SkipReason::Unscored => "missing score data",
            SkipReason::ZeroMaxScore => "zero max score",
            SkipReason::Duplicate => "already recorded",
        };
        f.write_str(reason)
    }
}

/// Errors that abort a course sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{operation} failed: {source}")]
    Api {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Concurrent commits kept invalidating each other.
    #[error("gave up recording submission {submission_id} after {attempts} stale commits")]
    Contention { submission_id: String, attempts: u32 },

    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = ApiError::Status {
            status: 503,
            endpoint: "courses".into(),
            message: String::new(),
        };
        assert!(!err.is_permanent());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = ApiError::Status {
            status: 401,
            endpoint: "courses".into(),
            message: "invalid token".into(),
        };
        assert!(err.is_permanent());
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let err = ApiError::RateLimited {
            endpoint: "courses/1/quizzes".into(),
            retry_after_secs: 30,
        };
        assert!(!err.is_permanent());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn sync_error_names_the_operation() {
        let err = SyncError::Api {
            operation: "fetch quizzes for course 7".into(),
            source: ApiError::Timeout {
                endpoint: "courses/7/quizzes".into(),
                secs: 30,
            },
        };
        let msg = err.to_string();
        assert!(msg.starts_with("fetch quizzes for course 7 failed"));
        assert!(msg.contains("timed out"));
    }
}
