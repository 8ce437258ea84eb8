use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Programmer errors in column or rule definitions, caught when a validator is built
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{column}' has an invalid pattern: {error}")]
    InvalidPattern { column: String, error: String },

    #[error("rule '{0}' has no source field")]
    MissingSource(String),

    #[error("rule '{0}' has no condition")]
    MissingCondition(String),

    #[error("rule '{0}' compares against a value but none is set")]
    MissingValue(String),

    #[error("rule '{rule}' references unknown field '{field}'")]
    UnknownField { rule: String, field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Field-scoped validation failures, in column order
#[derive(Debug, Error, Clone, PartialEq)]
#[error("validation failed on {} field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    /// `{field: message}` keeping the first message per field
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for error in &self.0 {
            if !map.contains_key(&error.field) {
                map.insert(error.field.clone(), Value::String(error.message.clone()));
            }
        }
        map
    }

    pub fn first_message(&self) -> Option<&str> {
        self.0.first().map(|e| e.message.as_str())
    }
}
