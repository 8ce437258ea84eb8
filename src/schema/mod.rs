// Schema builder: turns a category's columns and dependency rules into a validator
// for submitted form data.

pub mod errors;
pub mod field;
pub mod rules;

pub use errors::{FieldError, SchemaError, ValidationErrors};
pub use field::FieldValidator;
pub use rules::DependencyCheck;

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::models::{Column, ValidationRule};

#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Upper bound for text fields without an explicit maxLength
    pub max_text_length: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self { max_text_length: 1000 }
    }
}

impl SchemaOptions {
    pub fn from_config() -> Self {
        Self {
            max_text_length: crate::config::config().forms.max_text_length,
        }
    }
}

/// Compiled validator for one category
#[derive(Debug, Clone)]
pub struct FormValidator {
    fields: Vec<FieldValidator>,
    rules: Vec<DependencyCheck>,
}

/// Build a validator from column definitions and dependency rules.
///
/// Columns are validated in `orderIndex` order. Malformed definitions are reported here,
/// never at validation time.
pub fn build_schema(
    columns: &[Column],
    rules: &[ValidationRule],
    options: &SchemaOptions,
) -> Result<FormValidator, SchemaError> {
    let mut ordered: Vec<&Column> = columns.iter().collect();
    ordered.sort_by_key(|c| c.order_index);

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(ordered.len());
    for column in ordered {
        if !seen.insert(column.name.as_str()) {
            return Err(SchemaError::DuplicateColumn(column.name.clone()));
        }
        fields.push(FieldValidator::compile(column, options)?);
    }

    let rules = rules
        .iter()
        .map(|rule| DependencyCheck::compile(rule, &seen))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FormValidator { fields, rules })
}

impl FormValidator {
    /// Validate raw input into the typed record that will be persisted.
    ///
    /// Unknown keys are dropped and absent optional fields are omitted.
    pub fn validate(&self, input: &Map<String, Value>) -> Result<Map<String, Value>, ValidationErrors> {
        let mut output = Map::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            match field.check(input.get(field.name())) {
                Ok(Some(value)) => {
                    output.insert(field.name().to_string(), value);
                }
                Ok(None) => {}
                Err(message) => errors.push(FieldError::new(field.name(), message)),
            }
        }

        for rule in &self.rules {
            if errors.iter().any(|e| e.field == rule.target) {
                continue;
            }
            if let Some(message) = rule.check(&output) {
                errors.push(FieldError::new(&rule.target, message));
            }
        }

        if errors.is_empty() {
            return Ok(output);
        }

        // Report in column order regardless of which pass produced the error
        let position = |name: &str| self.fields.iter().position(|f| f.name() == name).unwrap_or(usize::MAX);
        errors.sort_by_key(|e| position(&e.field));
        Err(ValidationErrors(errors))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }

    pub fn field(&self, name: &str) -> Option<&FieldValidator> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnType, RuleCondition};
    use serde_json::json;
    use uuid::Uuid;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn validator(columns: Vec<Column>, rules: Vec<ValidationRule>) -> FormValidator {
        build_schema(&columns, &rules, &SchemaOptions::default()).expect("schema builds")
    }

    #[test]
    fn required_and_optional_text() {
        let cat = Uuid::new_v4();
        let v = validator(vec![Column::new(cat, "Name", ColumnType::Text).required()], vec![]);

        let ok = v.validate(&obj(json!({"Name": "  Lyceum 5 "}))).unwrap();
        assert_eq!(ok.get("Name"), Some(&json!("Lyceum 5")));

        let err = v.validate(&obj(json!({"Name": ""}))).unwrap_err();
        assert_eq!(err.0, vec![FieldError::new("Name", "Name is required")]);

        let optional = validator(vec![Column::new(cat, "Notes", ColumnType::Text)], vec![]);
        let out = optional.validate(&obj(json!({}))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn text_length_bound_defaults_to_options() {
        let cat = Uuid::new_v4();
        let columns = vec![Column::new(cat, "Notes", ColumnType::Textarea)];
        let v = build_schema(&columns, &[], &SchemaOptions { max_text_length: 5 }).unwrap();

        assert!(v.validate(&obj(json!({"Notes": "12345"}))).is_ok());
        let err = v.validate(&obj(json!({"Notes": "123456"}))).unwrap_err();
        assert_eq!(err.0[0].message, "Notes must be at most 5 characters");
    }

    #[test]
    fn select_membership() {
        let cat = Uuid::new_v4();
        let v = validator(
            vec![Column::new(cat, "Shift", ColumnType::Select).with_options(["A", "B"])],
            vec![],
        );

        assert!(v.validate(&obj(json!({"Shift": "A"}))).is_ok());
        let err = v.validate(&obj(json!({"Shift": "C"}))).unwrap_err();
        assert_eq!(err.0[0].message, "Shift must be one of: A, B");
    }

    #[test]
    fn numbers_are_coerced_and_unknown_keys_dropped() {
        let cat = Uuid::new_v4();
        let v = validator(
            vec![
                Column::new(cat, "Student Count", ColumnType::Number).required(),
                Column::new(cat, "Ratio", ColumnType::Number),
            ],
            vec![],
        );

        let out = v
            .validate(&obj(json!({"Student Count": "450", "Ratio": "1.5", "extra": "x"})))
            .unwrap();
        assert_eq!(out.get("Student Count"), Some(&json!(450)));
        assert_eq!(out.get("Ratio"), Some(&json!(1.5)));
        assert!(!out.contains_key("extra"));

        let err = v.validate(&obj(json!({"Student Count": ""}))).unwrap_err();
        assert_eq!(err.0, vec![FieldError::new("Student Count", "Student Count is required")]);
    }

    #[test]
    fn dependency_rule_requires_target_when_source_holds() {
        let cat = Uuid::new_v4();
        let columns = vec![
            Column::new(cat, "Has Library", ColumnType::Select).with_options(["yes", "no"]),
            Column::new(cat, "Library Books", ColumnType::Number),
        ];
        let rule = ValidationRule::dependency(
            cat,
            "Has Library",
            RuleCondition::Equals,
            Some("yes".into()),
            "Library Books",
        );
        let v = validator(columns, vec![rule]);

        let err = v.validate(&obj(json!({"Has Library": "yes"}))).unwrap_err();
        assert_eq!(err.0[0].field, "Library Books");
        assert!(err.0[0].message.contains("Has Library"));

        assert!(v.validate(&obj(json!({"Has Library": "yes", "Library Books": 120}))).is_ok());
        assert!(v.validate(&obj(json!({"Has Library": "no"}))).is_ok());
    }

    #[test]
    fn errors_follow_column_order() {
        let cat = Uuid::new_v4();
        let mut first = Column::new(cat, "First", ColumnType::Text).required();
        first.order_index = 0;
        let mut second = Column::new(cat, "Second", ColumnType::Email);
        second.order_index = 1;
        let v = validator(vec![second, first], vec![]);

        let err = v.validate(&obj(json!({"Second": "nope"}))).unwrap_err();
        let fields: Vec<&str> = err.0.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["First", "Second"]);
    }

    #[test]
    fn choice_without_options_accepts_any_string() {
        let cat = Uuid::new_v4();
        let v = validator(vec![Column::new(cat, "Shift", ColumnType::Select).required()], vec![]);

        let out = v.validate(&obj(json!({"Shift": "x"}))).unwrap();
        assert_eq!(out.get("Shift"), Some(&json!("x")));

        let err = v.validate(&obj(json!({"Shift": ""}))).unwrap_err();
        assert_eq!(err.0[0].field, "Shift");
    }

    #[test]
    fn exists_rule_only_fires_on_non_empty_source() {
        let cat = Uuid::new_v4();
        let columns = vec![
            Column::new(cat, "hasPhone", ColumnType::Text),
            Column::new(cat, "phoneNumber", ColumnType::Text),
        ];
        let rule = ValidationRule::dependency(cat, "hasPhone", RuleCondition::Exists, None, "phoneNumber");
        let v = validator(columns, vec![rule]);

        assert!(v.validate(&obj(json!({"hasPhone": "", "phoneNumber": ""}))).is_ok());
        assert!(v.validate(&obj(json!({}))).is_ok());

        let err = v.validate(&obj(json!({"hasPhone": "yes", "phoneNumber": ""}))).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].field, "phoneNumber");
    }

    #[test]
    fn malformed_definitions_fail_at_build_time() {
        let cat = Uuid::new_v4();
        let dup = vec![Column::new(cat, "A", ColumnType::Text), Column::new(cat, "A", ColumnType::Number)];
        assert!(matches!(
            build_schema(&dup, &[], &SchemaOptions::default()),
            Err(SchemaError::DuplicateColumn(_))
        ));

        let columns = vec![Column::new(cat, "A", ColumnType::Text)];
        let rule = ValidationRule::dependency(cat, "A", RuleCondition::Equals, None, "A");
        assert!(matches!(
            build_schema(&columns, &[rule], &SchemaOptions::default()),
            Err(SchemaError::MissingValue(_))
        ));

        let rule = ValidationRule::dependency(cat, "Ghost", RuleCondition::Exists, None, "A");
        assert!(matches!(
            build_schema(&columns, &[rule], &SchemaOptions::default()),
            Err(SchemaError::UnknownField { .. })
        ));
    }
}
