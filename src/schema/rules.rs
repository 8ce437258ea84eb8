use serde_json::{Map, Value};
use std::collections::HashSet;

use super::SchemaError;
use crate::models::{RuleCondition, ValidationRule};

/// Compiled dependency rule: `target` is required when `source` meets `condition`
#[derive(Debug, Clone)]
pub struct DependencyCheck {
    pub source: String,
    pub target: String,
    condition: RuleCondition,
    value: Option<String>,
    message: String,
}

impl DependencyCheck {
    pub fn compile(rule: &ValidationRule, known: &HashSet<&str>) -> Result<Self, SchemaError> {
        let source = rule
            .source_field
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SchemaError::MissingSource(rule.name.clone()))?;
        let condition = rule
            .condition
            .ok_or_else(|| SchemaError::MissingCondition(rule.name.clone()))?;
        if condition != RuleCondition::Exists && rule.value.is_none() {
            return Err(SchemaError::MissingValue(rule.name.clone()));
        }

        for field in [&source, &rule.target_field] {
            if !known.contains(field.as_str()) {
                return Err(SchemaError::UnknownField {
                    rule: rule.name.clone(),
                    field: field.clone(),
                });
            }
        }

        let message = if rule.message.trim().is_empty() {
            format!(
                "{} is required when {} {}",
                rule.target_field,
                source,
                condition.describe(rule.value.as_deref())
            )
        } else {
            rule.message.clone()
        };

        Ok(Self {
            source,
            target: rule.target_field.clone(),
            condition,
            value: rule.value.clone(),
            message,
        })
    }

    /// Runs over the validated record; returns the message when the target is missing
    pub fn check(&self, record: &Map<String, Value>) -> Option<String> {
        if record.contains_key(&self.target) || !self.holds(record.get(&self.source)) {
            return None;
        }
        Some(self.message.clone())
    }

    fn holds(&self, source: Option<&Value>) -> bool {
        let Some(source) = source else {
            return false;
        };
        let expected = self.value.as_deref().unwrap_or_default();
        match self.condition {
            RuleCondition::Exists => true,
            RuleCondition::Equals => as_text(source) == expected,
            RuleCondition::NotEquals => as_text(source) != expected,
        }
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn generated_message_names_both_fields() {
        let rule = ValidationRule::dependency(Uuid::new_v4(), "Gym", RuleCondition::Exists, None, "Gym Area");
        let known = HashSet::from(["Gym", "Gym Area"]);
        let check = DependencyCheck::compile(&rule, &known).unwrap();

        let mut record = Map::new();
        record.insert("Gym".into(), json!(true));
        assert_eq!(
            check.check(&record).as_deref(),
            Some("Gym Area is required when Gym is filled in")
        );
    }

    #[test]
    fn numeric_sources_compare_as_text() {
        let rule = ValidationRule::dependency(
            Uuid::new_v4(),
            "Shifts",
            RuleCondition::NotEquals,
            Some("1".into()),
            "Second Shift Start",
        )
        .with_message("Second shift needs a start time");
        let known = HashSet::from(["Shifts", "Second Shift Start"]);
        let check = DependencyCheck::compile(&rule, &known).unwrap();

        let mut record = Map::new();
        record.insert("Shifts".into(), json!(1));
        assert_eq!(check.check(&record), None);
        record.insert("Shifts".into(), json!(2));
        assert_eq!(check.check(&record).as_deref(), Some("Second shift needs a start time"));
    }
}
