use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storefleet_core::StoreError;

/// Unified error type for HTTP responses.
///
/// Body is always `{"error": <message>}`; the status comes from the
/// underlying `StoreError` when there is one.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<StoreError>() {
            Some(StoreError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Some(StoreError::StoreNotFound(_)) => StatusCode::NOT_FOUND,
            Some(
                StoreError::ValuesMissing { .. }
                | StoreError::Backend(_)
                | StoreError::ToolNotFound(_)
                | StoreError::Probe(_)
                | StoreError::Registry(_)
                | StoreError::InvalidConfig(_)
                | StoreError::Io(_)
                | StoreError::Yaml(_)
                | StoreError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
