use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::db::store::StoreError;
use crate::roles::RoleError;
use crate::workflow::WorkflowError;

/// ✅ **Envelope returned by every endpoint**
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: Some(data),
            errors: None,
        }
    }

    /// Create an error response
    pub fn error(
        status: StatusCode,
        message: impl Into<String>,
        errors: Option<serde_json::Value>,
    ) -> Self {
        ApiResponse {
            success: false,
            status_code: status.as_u16(),
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
            data: None,
            errors,
        }
    }
}

/// Storage failures never leak driver details to clients.
fn storage_failure(err: &StoreError) -> ApiResponse<()> {
    error!("Storage failure: {}", err);
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Storage is unavailable, please retry",
        None,
    )
}

impl From<StoreError> for ApiResponse<()> {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound(what) => {
                ApiResponse::error(StatusCode::NOT_FOUND, format!("{} not found", what), None)
            }
            StoreError::Conflict(msg) => ApiResponse::error(
                StatusCode::CONFLICT,
                "The request conflicts with the current state",
                Some(json!({ "error": msg })),
            ),
            StoreError::Database(_) => storage_failure(&err),
        }
    }
}

impl From<WorkflowError> for ApiResponse<()> {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Unauthorized(msg) => ApiResponse::error(StatusCode::FORBIDDEN, msg, None),
            WorkflowError::Validation(msg) => ApiResponse::error(StatusCode::BAD_REQUEST, msg, None),
            WorkflowError::Conflict(msg) => ApiResponse::error(StatusCode::CONFLICT, msg, None),
            WorkflowError::NotFound(what) => {
                ApiResponse::error(StatusCode::NOT_FOUND, format!("{} not found", what), None)
            }
            WorkflowError::Storage(e) => storage_failure(&e),
        }
    }
}

impl From<RoleError> for ApiResponse<()> {
    fn from(err: RoleError) -> Self {
        let message = err.to_string();
        match err {
            RoleError::PermissionDenied(_) | RoleError::SelfModification(_) => {
                ApiResponse::error(StatusCode::FORBIDDEN, message, None)
            }
            RoleError::AlreadyAssigned | RoleError::Validation(_) => {
                ApiResponse::error(StatusCode::BAD_REQUEST, message, None)
            }
            RoleError::NotFound(_) => ApiResponse::error(StatusCode::NOT_FOUND, message, None),
            RoleError::Conflict(_) => ApiResponse::error(StatusCode::CONFLICT, message, None),
            RoleError::Hashing(e) => {
                error!("Password hashing failed: {}", e);
                ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Password hashing failed", None)
            }
            RoleError::Storage(e) => storage_failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let cases = [
            (WorkflowError::Unauthorized("no".into()), 403),
            (WorkflowError::Validation("bad".into()), 400),
            (WorkflowError::Conflict("stale".into()), 409),
            (WorkflowError::NotFound("booking"), 404),
            (
                WorkflowError::Storage(StoreError::Database(sqlx::Error::PoolTimedOut)),
                500,
            ),
        ];
        for (err, status) in cases {
            let response: ApiResponse<()> = err.into();
            assert_eq!(response.status_code, status);
            assert!(!response.success);
        }
    }

    #[test]
    fn role_errors_keep_their_message() {
        let response: ApiResponse<()> = RoleError::AlreadyAssigned.into();
        assert_eq!(response.status_code, 400);
        assert!(response.message.contains("update_role"));

        let response: ApiResponse<()> = RoleError::SelfModification("nope".into()).into();
        assert_eq!(response.status_code, 403);
        assert_eq!(response.message, "nope");
    }

    #[test]
    fn database_details_are_hidden() {
        let response: ApiResponse<()> = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(response.status_code, 500);
        assert!(!response.message.contains("pool"));
        assert!(response.errors.is_none());
    }
}
