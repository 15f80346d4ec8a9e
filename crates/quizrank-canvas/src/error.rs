//! Client error types.
//!
//! The error type itself lives in `quizrank-core` so the sync engine can
//! classify failures without depending on this crate.

pub use quizrank_core::error::ApiError;

/// Map a transport-level `reqwest` failure for `endpoint`.
pub(crate) fn transport_error(endpoint: &str, timeout_secs: u64, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout {
            endpoint: endpoint.to_string(),
            secs: timeout_secs,
        }
    } else {
        ApiError::Network {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    }
}

/// Map a body that failed to deserialize.
pub(crate) fn decode_error(endpoint: &str, e: impl std::fmt::Display) -> ApiError {
    ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}
