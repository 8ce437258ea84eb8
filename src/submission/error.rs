use thiserror::Error;

use crate::schema::{SchemaError, ValidationErrors};
use crate::store::StoreError;
use crate::types::{FormStatus, PermissionAction};

/// Failures of the form submission pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmitError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("access denied: {0}")]
    AccessDenied(PermissionAction),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("cannot move a {from} entry to {to}")]
    InvalidTransition { from: FormStatus, to: FormStatus },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("{}", .0.user_message())]
    Store(#[from] StoreError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl From<ValidationErrors> for SubmitError {
    fn from(errors: ValidationErrors) -> Self {
        SubmitError::Validation(errors)
    }
}

impl SubmitError {
    /// Short label used in the outcome log line
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::Validation(_) => "validation",
            SubmitError::AccessDenied(_) => "access_denied",
            SubmitError::NotFound(_) => "not_found",
            SubmitError::InvalidTransition { .. } => "invalid_transition",
            SubmitError::Conflict(_) => "conflict",
            SubmitError::Schema(_) => "schema",
            SubmitError::Store(_) => "backend",
            SubmitError::Timeout(_) => "timeout",
            SubmitError::Cancelled => "cancelled",
            SubmitError::Internal(_) => "internal",
        }
    }
}
