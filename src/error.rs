// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};

use crate::models::ModelError;
use crate::notifications::MassNotifyError;
use crate::reporting::FilterError;
use crate::reporting::{ExportError, ImportError};
use crate::schema::{SchemaError, ValidationErrors};
use crate::statistics::StatisticsError;
use crate::store::manager::DatabaseError;
use crate::store::StoreError;
use crate::submission::SubmitError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity (field-scoped validation failures)
    Validation {
        message: String,
        errors: Map<String, Value>,
    },

    // 499 Client Closed Request
    Cancelled,

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 504 Gateway Timeout (a pipeline step ran out of time)
    Timeout(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Validation { .. } => 422,
            ApiError::Cancelled => 499,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Timeout(_) => 504,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Timeout(msg) => msg,
            ApiError::Validation { message, .. } => message,
            ApiError::Cancelled => "Request was cancelled",
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "ACCESS_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::Cancelled => "CANCELLED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Timeout(_) => "TIMEOUT",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        });
        if let ApiError::Validation { errors, .. } = self {
            body["errors"] = Value::Object(errors.clone());
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    /// Standard denial for a missing permission
    pub fn access_denied(action: crate::types::PermissionAction) -> Self {
        ApiError::Forbidden(format!("You do not have permission to {}", action.as_str().replace('_', " ")))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>, errors: Map<String, Value>) -> Self {
        ApiError::Validation {
            message: message.into(),
            errors,
        }
    }

    /// Single-field validation failure
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = Map::new();
        errors.insert(field.to_string(), Value::String(message.clone()));
        ApiError::Validation { message, errors }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.user_message();
        match err {
            StoreError::NotFound(_) => ApiError::not_found(message),
            StoreError::Duplicate(_) | StoreError::Conflict(_) => ApiError::conflict(message),
            StoreError::ForeignKey(_) => ApiError::bad_request(message),
            StoreError::Configuration(detail) => {
                tracing::error!("Storage configuration error: {}", detail);
                ApiError::service_unavailable(message)
            }
            StoreError::Seed(detail) | StoreError::Backend(detail) => {
                tracing::error!("Storage error: {}", detail);
                ApiError::internal_server_error(message)
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::service_unavailable("Database temporarily unavailable")
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match &err {
            ModelError::MissingField(field) => ApiError::field(field, err.to_string()),
            ModelError::ProfileScope { field, .. } => ApiError::field(field, err.to_string()),
            ModelError::MissingOptions(..) => ApiError::field("options", err.to_string()),
            ModelError::ScopeConflict => ApiError::bad_request(err.to_string()),
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        tracing::error!("Invalid form definition: {}", err);
        ApiError::internal_server_error(format!("Form definition is invalid: {}", err))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        let message = err.first_message().unwrap_or("Validation failed").to_string();
        ApiError::validation(message, err.to_map())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(errors) => errors.into(),
            SubmitError::AccessDenied(action) => ApiError::access_denied(action),
            SubmitError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            SubmitError::InvalidTransition { from, to } => {
                ApiError::conflict(format!("Cannot move a {} entry to {}", from, to))
            }
            SubmitError::Conflict(message) => ApiError::conflict(message),
            SubmitError::Schema(e) => e.into(),
            SubmitError::Store(e) => e.into(),
            SubmitError::Timeout(step) => ApiError::Timeout(format!("{} took too long", step)),
            SubmitError::Cancelled => ApiError::Cancelled,
            SubmitError::Internal(message) => ApiError::internal_server_error(message),
        }
    }
}

impl From<StatisticsError> for ApiError {
    fn from(err: StatisticsError) -> Self {
        match err {
            StatisticsError::InvalidTarget => ApiError::bad_request(err.to_string()),
            StatisticsError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            StatisticsError::AccessDenied => ApiError::access_denied(crate::types::PermissionAction::ViewDashboard),
            StatisticsError::Store(e) => e.into(),
        }
    }
}

impl From<MassNotifyError> for ApiError {
    fn from(err: MassNotifyError) -> Self {
        match err {
            MassNotifyError::TargetNotFound(id) => ApiError::not_found(format!("Target {} not found", id)),
            MassNotifyError::AccessDenied => ApiError::access_denied(crate::types::PermissionAction::ManageUsers),
            MassNotifyError::Store(e) => e.into(),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(e) => e.into(),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        tracing::error!("Export failed: {}", err);
        ApiError::internal_server_error("Failed to build the spreadsheet")
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldError;

    #[test]
    fn validation_errors_render_field_map() {
        let err: ApiError = ValidationErrors(vec![FieldError::new("Email", "Email must be a valid email address")]).into();
        assert_eq!(err.status_code(), 422);
        let body = err.to_json();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errors"]["Email"], json!("Email must be a valid email address"));
    }

    #[test]
    fn denials_use_access_denied_code() {
        let err = ApiError::access_denied(crate::types::PermissionAction::ManageTables);
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_json()["code"], json!("ACCESS_DENIED"));
    }

    #[test]
    fn duplicate_rows_become_conflicts() {
        let err: ApiError = StoreError::Duplicate("uniq".into()).into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "record already exists");
    }
}
