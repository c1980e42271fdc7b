use lifecycle::{ErrorKind, OperationError};
use thiserror::Error;

use super::common::ApiErrorDetails;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Resource is locked by another operation")]
    Locked,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    /// HTTP status behind the error, when there is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            ApiError::AuthError => Some(401),
            ApiError::Locked => Some(423),
            ApiError::RateLimited => Some(429),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// SakuraCloud `error_code` from the response body
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ApiError::ApiError {
                details: Some(details),
                ..
            } => details.error_code.as_deref(),
            _ => None,
        }
    }
}

impl From<ApiError> for OperationError {
    fn from(err: ApiError) -> Self {
        let kind = if err.is_not_found() {
            ErrorKind::NotFound
        } else if err.is_conflict() {
            ErrorKind::Conflict
        } else {
            ErrorKind::Other
        };
        OperationError::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> ApiError {
        ApiError::ApiError {
            status,
            message: "error".to_string(),
            details: None,
        }
    }

    #[test]
    fn status_classification() {
        assert!(api_error(404).is_not_found());
        assert!(api_error(409).is_conflict());
        assert!(!api_error(500).is_not_found());
        assert_eq!(ApiError::Locked.status(), Some(423));
        assert_eq!(ApiError::ParseError("bad".into()).status(), None);
    }

    #[test]
    fn converts_to_operation_error_kind() {
        let err: OperationError = api_error(404).into();
        assert!(err.is_not_found());

        let err: OperationError = api_error(409).into();
        assert!(err.is_conflict());

        let err: OperationError = ApiError::ServiceUnavailable.into();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.to_string(), "Service unavailable, retry later");
    }

    #[test]
    fn error_code_comes_from_details() {
        let err = ApiError::ApiError {
            status: 409,
            message: "still in use".to_string(),
            details: Some(Box::new(ApiErrorDetails {
                error_code: Some("still_creating".to_string()),
                ..Default::default()
            })),
        };
        assert_eq!(err.error_code(), Some("still_creating"));
        assert_eq!(api_error(409).error_code(), None);
    }
}
