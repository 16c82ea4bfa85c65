//! Errors for backend API calls.

use thiserror::Error;

/// Errors that can occur when talking to the Mibu backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (transport level).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Bearer token missing, expired, or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// A successful HTTP response failed an invariant check (e.g. a
    /// switch-role payload confirming a different role than requested).
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("country tw".to_string());
        assert_eq!(err.to_string(), "Not found: country tw");

        let err = ApiError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 502 - bad gateway");
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ApiError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn test_validation_display() {
        let err = ApiError::Validation("switch response missing activeRole".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: switch response missing activeRole"
        );
    }
}
