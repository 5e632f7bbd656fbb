use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use symbolhub_shared::ValidationError;
use symbolhub_store::{ErrorKind, StoreError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Upload too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Object storage error: {0}")]
    ObjectStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable category reported in the `kind` field of error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Store(e) => e.kind().as_str(),
            ServerError::Validation(_)
            | ServerError::BadRequest(_)
            | ServerError::TooLarge { .. } => ErrorKind::InvalidRequest.as_str(),
            ServerError::Unauthorized(_) => "unauthorized",
            ServerError::Forbidden(_) => "forbidden",
            ServerError::NotFound(_) => ErrorKind::NotFound.as_str(),
            ServerError::ObjectStorage(_) | ServerError::Internal(_) => {
                ErrorKind::StorageFailure.as_str()
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(e) => match e.kind() {
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Validation(_) | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::ObjectStorage(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Extractor rejections are reported in the same JSON shape as handler errors.
macro_rules! rejection_is_bad_request {
    ($($rejection:ty),* $(,)?) => {
        $(
            impl From<$rejection> for ServerError {
                fn from(rejection: $rejection) -> Self {
                    ServerError::BadRequest(rejection.body_text())
                }
            }
        )*
    };
}

rejection_is_bad_request!(JsonRejection, QueryRejection, PathRejection, MultipartRejection);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "kind": self.kind(),
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kinds_pick_the_status() {
        let err = ServerError::from(StoreError::NotFound("post"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "not_found");

        let err = ServerError::from(StoreError::Conflict("taken".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ServerError::from(StoreError::Migration("boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "storage_failure");
    }

    #[test]
    fn validation_is_an_invalid_request() {
        let err = ServerError::from(ValidationError::NoQueryText);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "invalid_request");
    }

    #[tokio::test]
    async fn storage_details_are_not_leaked() {
        let resp = ServerError::from(StoreError::Migration("secret table".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "storage_failure");
        assert_eq!(body["error"], "Internal server error");
    }
}
