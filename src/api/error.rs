use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the bank API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credentials or token were rejected.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: StatusCode, message: String },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    /// The request could not be built from the given inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The identity service answered 2xx without issuing a token.
    #[error("token response has no access_token")]
    NoAccessToken,

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode(message.into())
    }

    pub fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ApiError::Unauthorized { status, message }
        } else {
            ApiError::Http { status, message }
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Transport(e) => e.status(),
            ApiError::Unauthorized { status, .. } | ApiError::Http { status, .. } => Some(*status),
            ApiError::InvalidRequest(_) | ApiError::NoAccessToken | ApiError::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// True when the identity service refused to issue a token for the
    /// presented credentials, as opposed to being unreachable or failing.
    pub fn rejects_credentials(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. } | ApiError::NoAccessToken)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "bad token".to_string());
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad quote".to_string());
        assert!(!err.is_unauthorized());
        assert_eq!(err.to_string(), "HTTP 422 Unprocessable Entity: bad quote");

        assert_eq!(ApiError::decode("missing guid").status(), None);
    }

    #[test]
    fn test_only_refusals_reject_credentials() {
        assert!(ApiError::from_status(StatusCode::FORBIDDEN, String::new()).rejects_credentials());
        assert!(ApiError::NoAccessToken.rejects_credentials());

        let outage = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "maintenance".to_string());
        assert!(!outage.rejects_credentials());
        assert!(!ApiError::decode("not json").rejects_credentials());
    }
}
