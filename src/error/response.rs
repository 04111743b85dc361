//! HTTP boundary for [`Error`].
//!
//! The status comes from the error's kind. Server-side kinds (5xx) are
//! answered with the kind name and a generic message only; the full error is
//! logged instead.

use super::{Error, ErrorKind};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

/// Message sent in place of internal details for 5xx kinds.
pub const GENERIC_MESSAGE: &str = "internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub message: String,
}

impl ErrorBody {
    /// Build the caller-visible body, hiding details of server-side kinds.
    pub fn from_error(err: &Error) -> Self {
        let kind = err.kind();
        if kind.is_client_facing() {
            Self {
                kind,
                code: err.code().map(|c| c.as_str().to_string()),
                param: err.param().map(|p| p.as_str().to_string()),
                message: err.message(),
            }
        } else {
            Self {
                kind,
                code: None,
                param: None,
                message: GENERIC_MESSAGE.to_string(),
            }
        }
    }
}

/// Transport status for an error.
pub fn status_of(err: &Error) -> StatusCode {
    err.kind().status()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        let code = self.code().map(|c| c.as_str()).unwrap_or("");

        if status.is_server_error() {
            error!(
                kind = %self.kind(),
                code = %code,
                status = status.as_u16(),
                error = %self,
                "API error"
            );
        } else {
            warn!(
                kind = %self.kind(),
                code = %code,
                status = status.as_u16(),
                error = %self,
                "API error"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody::from_error(&self),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_exposes_details() {
        let err = Error::validation("title", "title is required").with_code("missing_field");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "validation");
        assert_eq!(body["error"]["code"], "missing_field");
        assert_eq!(body["error"]["param"], "title");
        assert_eq!(body["error"]["message"], "title is required");
    }

    #[tokio::test]
    async fn test_not_exist_is_404() {
        let response = Error::new(ErrorKind::NotExist, "movie not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = Error::internal("rollback_err", "pq: relation \"movie\" does not exist")
            .with_param("secret");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "internal");
        assert_eq!(body["error"]["message"], GENERIC_MESSAGE);
        assert!(body["error"].get("code").is_none());
        assert!(body["error"].get("param").is_none());
    }

    #[tokio::test]
    async fn test_unclassified_error_is_500() {
        let response = Error::msg("something odd").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "other");
    }

    #[test]
    fn test_status_uses_chain_kind() {
        let err = Error::wrap(Error::new(ErrorKind::Permission, "no"));
        assert_eq!(status_of(&err), StatusCode::FORBIDDEN);
    }
}
