use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use super::{SchemaError, SchemaOptions};
use crate::models::{Column, ColumnType};

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("phone pattern"));

#[derive(Debug, Clone)]
enum Kind {
    Text {
        min: Option<usize>,
        max: usize,
        pattern: Option<Regex>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Date,
    Choice(Vec<String>),
    Checkbox,
    Email,
    Phone,
}

/// Validator for a single column
#[derive(Debug, Clone)]
pub struct FieldValidator {
    name: String,
    required: bool,
    kind: Kind,
}

impl FieldValidator {
    pub fn compile(column: &Column, options: &SchemaOptions) -> Result<Self, SchemaError> {
        let kind = match column.column_type {
            ColumnType::Text | ColumnType::Textarea => {
                let pattern = match column.pattern.as_deref().filter(|p| !p.is_empty()) {
                    Some(p) => Some(Regex::new(p).map_err(|e| SchemaError::InvalidPattern {
                        column: column.name.clone(),
                        error: e.to_string(),
                    })?),
                    None => None,
                };
                Kind::Text {
                    min: column.min_length.and_then(|n| usize::try_from(n).ok()),
                    max: column
                        .max_length
                        .and_then(|n| usize::try_from(n).ok())
                        .unwrap_or(options.max_text_length),
                    pattern,
                }
            }
            ColumnType::Number => Kind::Number {
                min: column.min_value,
                max: column.max_value,
            },
            ColumnType::Date => Kind::Date,
            // Choices without options (legacy rows) validate as plain strings
            ColumnType::Select | ColumnType::Radio if column.options.is_empty() => Kind::Text {
                min: None,
                max: options.max_text_length,
                pattern: None,
            },
            ColumnType::Select | ColumnType::Radio => Kind::Choice(column.options.clone()),
            ColumnType::Checkbox => Kind::Checkbox,
            ColumnType::Email => Kind::Email,
            ColumnType::Phone => Kind::Phone,
        };

        Ok(Self {
            name: column.name.clone(),
            required: column.required,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// `Ok(None)` means absent and allowed; `Err` carries the user-facing message
    pub fn check(&self, raw: Option<&Value>) -> Result<Option<Value>, String> {
        let value = match raw {
            None | Some(Value::Null) => None,
            Some(v) => self.coerce(v)?,
        };

        match value {
            None if self.required => Err(format!("{} is required", self.name)),
            other => Ok(other),
        }
    }

    fn coerce(&self, raw: &Value) -> Result<Option<Value>, String> {
        match &self.kind {
            Kind::Text { min, max, pattern } => {
                let Some(text) = self.text(raw)? else {
                    return Ok(None);
                };
                let len = text.chars().count();
                if let Some(min) = min {
                    if len < *min {
                        return Err(format!("{} must be at least {} characters", self.name, min));
                    }
                }
                if len > *max {
                    return Err(format!("{} must be at most {} characters", self.name, max));
                }
                if let Some(pattern) = pattern {
                    if !pattern.is_match(&text) {
                        return Err(format!("{} has an invalid format", self.name));
                    }
                }
                Ok(Some(Value::String(text)))
            }
            Kind::Number { min, max } => {
                let Some(number) = self.number(raw)? else {
                    return Ok(None);
                };
                let as_f64 = number.as_f64().unwrap_or_default();
                if let Some(min) = min {
                    if as_f64 < *min {
                        return Err(format!("{} must be at least {}", self.name, min));
                    }
                }
                if let Some(max) = max {
                    if as_f64 > *max {
                        return Err(format!("{} must be at most {}", self.name, max));
                    }
                }
                Ok(Some(Value::Number(number)))
            }
            Kind::Date => {
                let Some(text) = self.text(raw)? else {
                    return Ok(None);
                };
                let valid = NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok()
                    || DateTime::parse_from_rfc3339(&text).is_ok();
                if !valid {
                    return Err(format!("{} must be a valid date", self.name));
                }
                Ok(Some(Value::String(text)))
            }
            Kind::Choice(options) => {
                let Some(text) = self.text(raw)? else {
                    return Ok(None);
                };
                if !options.iter().any(|o| *o == text) {
                    return Err(format!("{} must be one of: {}", self.name, options.join(", ")));
                }
                Ok(Some(Value::String(text)))
            }
            Kind::Checkbox => match raw {
                Value::Bool(b) => Ok(Some(Value::Bool(*b))),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "" => Ok(None),
                    "true" => Ok(Some(Value::Bool(true))),
                    "false" => Ok(Some(Value::Bool(false))),
                    _ => Err(format!("{} must be true or false", self.name)),
                },
                _ => Err(format!("{} must be true or false", self.name)),
            },
            Kind::Email => self.formatted(raw, &EMAIL, "a valid email address"),
            Kind::Phone => self.formatted(raw, &PHONE, "a valid phone number"),
        }
    }

    fn formatted(&self, raw: &Value, format: &Regex, what: &str) -> Result<Option<Value>, String> {
        let Some(text) = self.text(raw)? else {
            return Ok(None);
        };
        if !format.is_match(&text) {
            return Err(format!("{} must be {}", self.name, what));
        }
        Ok(Some(Value::String(text)))
    }

    /// Trimmed string; empty strings are absent
    fn text(&self, raw: &Value) -> Result<Option<String>, String> {
        let text = match raw {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(format!("{} must be text", self.name)),
        };
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn number(&self, raw: &Value) -> Result<Option<Number>, String> {
        match raw {
            Value::Number(n) => Ok(Some(n.clone())),
            Value::String(s) => Ok(parse_number(s.trim())),
            _ => Err(format!("{} must be a number", self.name)),
        }
    }
}

/// Base-10 parse; integers stay integers, anything unparsable is absent
fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn field(column: Column) -> FieldValidator {
        FieldValidator::compile(&column, &SchemaOptions::default()).unwrap()
    }

    #[test]
    fn dates_accept_calendar_dates_and_timestamps() {
        let f = field(Column::new(Uuid::new_v4(), "Opened", ColumnType::Date));
        assert_eq!(f.check(Some(&json!("2024-09-15"))).unwrap(), Some(json!("2024-09-15")));
        assert!(f.check(Some(&json!("2024-09-15T08:00:00Z"))).unwrap().is_some());
        assert_eq!(
            f.check(Some(&json!("15/09/2024"))).unwrap_err(),
            "Opened must be a valid date"
        );
    }

    #[test]
    fn checkbox_accepts_string_booleans() {
        let f = field(Column::new(Uuid::new_v4(), "Heated", ColumnType::Checkbox));
        assert_eq!(f.check(Some(&json!("true"))).unwrap(), Some(json!(true)));
        assert_eq!(f.check(Some(&json!(false))).unwrap(), Some(json!(false)));
        assert!(f.check(Some(&json!("maybe"))).is_err());
    }

    #[test]
    fn number_bounds_and_unparsable_input() {
        let mut column = Column::new(Uuid::new_v4(), "Rooms", ColumnType::Number);
        column.min_value = Some(1.0);
        column.max_value = Some(100.0);
        let f = field(column);

        assert_eq!(f.check(Some(&json!("abc"))).unwrap(), None);
        assert_eq!(f.check(Some(&json!(0))).unwrap_err(), "Rooms must be at least 1");
        assert_eq!(f.check(Some(&json!("12"))).unwrap(), Some(json!(12)));
        assert_eq!(f.check(Some(&json!(true))).unwrap_err(), "Rooms must be a number");
    }

    #[test]
    fn email_and_phone_formats() {
        let email = field(Column::new(Uuid::new_v4(), "Email", ColumnType::Email));
        assert!(email.check(Some(&json!("director@school.az"))).is_ok());
        assert_eq!(
            email.check(Some(&json!("not-an-email"))).unwrap_err(),
            "Email must be a valid email address"
        );

        let phone = field(Column::new(Uuid::new_v4(), "Phone", ColumnType::Phone));
        assert!(phone.check(Some(&json!("+994 12 555-12-12"))).is_ok());
        assert!(phone.check(Some(&json!("call me"))).is_err());
    }

    #[test]
    fn pattern_is_compiled_once_and_enforced() {
        let mut column = Column::new(Uuid::new_v4(), "Code", ColumnType::Text);
        column.pattern = Some(r"^[A-Z]{3}\d{2}$".into());
        let f = field(column);
        assert!(f.check(Some(&json!("BAK01"))).is_ok());
        assert_eq!(f.check(Some(&json!("bak01"))).unwrap_err(), "Code has an invalid format");

        let mut broken = Column::new(Uuid::new_v4(), "Broken", ColumnType::Text);
        broken.pattern = Some("([".into());
        assert!(FieldValidator::compile(&broken, &SchemaOptions::default()).is_err());
    }
}
