use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use keystone_auth::AccessError;

pub fn access_error_to_response(err: AccessError) -> axum::response::Response {
    match err {
        AccessError::Denied { reason } => {
            json_error(StatusCode::FORBIDDEN, reason.as_str(), "access denied")
        }
        // A wiring bug, not the caller's fault.
        AccessError::IllegalCallerType { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "illegal_caller_type",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
