use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::time::Duration;

/// Errors returned by the intervention relay.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad request error (missing or malformed input).
    BadRequest(String),
    /// SMTP settings are missing or unusable.
    Configuration(String),
    /// The SMTP provider rejected or failed the send.
    EmailDelivery(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::EmailDelivery(msg) => write!(f, "Email delivery failed: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into a plain-text HTTP response.
    ///
    /// Validation problems map to 400; everything else is a 500. The body is the
    /// bare message so the dashboard can show it as-is.
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => {
                tracing::warn!("Rejected intervention request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Configuration(msg) => {
                tracing::error!("SMTP configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::EmailDelivery(msg) => {
                tracing::error!("SMTP send failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

/// Errors produced by the prediction backend client.
///
/// `Display` yields the human-readable message the dashboard shows; callers are
/// not expected to branch on the variant beyond [`ClientError::is_timeout`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// No response arrived before the deadline.
    Timeout { after: Duration },
    /// The request could not be sent or the connection failed.
    Transport(String),
    /// A response arrived but its body was not the expected JSON.
    Decode(String),
    /// The backend answered with a non-success status.
    Api { status: u16, detail: String },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// HTTP status of an application error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        ClientError::Api {
            status: 404,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Timeout { after } => {
                write!(f, "Request timed out after {}ms", after.as_millis())
            }
            ClientError::Transport(msg) => write!(f, "Network error: {}", msg),
            ClientError::Decode(msg) => write!(f, "Invalid response from server: {}", msg),
            ClientError::Api { detail, .. } => f.write_str(detail),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_client_error_messages() {
        let timeout = ClientError::Timeout {
            after: Duration::from_millis(8000),
        };
        assert_eq!(timeout.to_string(), "Request timed out after 8000ms");
        assert!(timeout.is_timeout());

        let api = ClientError::Api {
            status: 404,
            detail: "not found".to_string(),
        };
        assert_eq!(api.to_string(), "not found");
        assert_eq!(api.status(), Some(404));
        assert!(!api.is_timeout());
    }

    #[tokio::test]
    async fn test_bad_request_is_plain_text_400() {
        let response = AppError::BadRequest("Missing required fields: topSignal".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Missing required fields: topSignal");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::InternalError("mutex poisoned".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }
}
