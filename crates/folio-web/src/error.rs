use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use folio_core::FolioError;
use folio_core::error::ErrorPayload;

#[expect(
    clippy::needless_pass_by_value,
    reason = "handlers naturally own error values from `Result` and pass them through"
)]
pub fn folio_error_response(err: FolioError, operation: &str, route: Option<String>) -> Response {
    let status = status_for_folio_error(&err);
    if status.is_server_error() {
        tracing::error!(operation, error = %err, "request failed");
    } else {
        tracing::debug!(operation, error = %err, "request rejected");
    }
    (status, Json(err.to_payload(operation, route))).into_response()
}

pub fn multipart_error_response(err: &MultipartError, operation: &str) -> Response {
    let status = err.status();
    tracing::debug!(operation, error = %err, "multipart rejected");
    let payload = ErrorPayload {
        code: if status == StatusCode::PAYLOAD_TOO_LARGE {
            "PAYLOAD_TOO_LARGE".to_string()
        } else {
            "INVALID_MULTIPART".to_string()
        },
        message: err.body_text(),
        operation: operation.to_string(),
        trace_id: Uuid::new_v4().to_string(),
        route: None,
        details: Some(json!({ "status": status.as_u16() })),
    };
    (status, Json(payload)).into_response()
}

fn status_for_folio_error(err: &FolioError) -> StatusCode {
    match err {
        FolioError::InvalidRoute(_) | FolioError::PathTraversal(_) | FolioError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        FolioError::SecurityViolation(_) => StatusCode::FORBIDDEN,
        FolioError::NotFound(_) => StatusCode::NOT_FOUND,
        FolioError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND
        }
        FolioError::Io(_) | FolioError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
