//! Response envelope for the HTTP layer
//!
//! ```json
//! { "success": true, "payload": { ... } }
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "POV x not found", "retryable": false } }
//! ```

use crate::error::EngineError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&EngineError> for ApiError {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// `{ success, payload?, error? }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    #[must_use]
    pub fn err(error: &EngineError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<Result<T, EngineError>> for ApiResponse<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => {
                tracing::debug!(code = err.code(), error = %err, "request failed");
                Self::err(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_model::{ProjectId, RecordKind};
    use serde_json::json;

    #[test]
    fn success_envelope_carries_payload() {
        let response = ApiResponse::ok(ProjectId::from("p1"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "payload": "p1"})
        );
    }

    #[test]
    fn error_envelope_carries_code() {
        let result: Result<ProjectId, EngineError> =
            Err(EngineError::not_found(RecordKind::Pov, "pov-9"));
        let response = ApiResponse::from(result);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "error": {"code": "NOT_FOUND", "message": "POV pov-9 not found", "retryable": false}
            })
        );
    }
}
