use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "rule_type", rename_all = "lowercase")]
pub enum RuleType {
    Dependency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(type_name = "rule_condition", rename_all = "snake_case")]
pub enum RuleCondition {
    Exists,
    Equals,
    NotEquals,
}

impl RuleCondition {
    pub fn describe(&self, value: Option<&str>) -> String {
        match self {
            RuleCondition::Exists => "is filled in".to_string(),
            RuleCondition::Equals => format!("equals \"{}\"", value.unwrap_or_default()),
            RuleCondition::NotEquals => format!("does not equal \"{}\"", value.unwrap_or_default()),
        }
    }
}

/// Cross-field constraint: targetField is required when sourceField meets condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub target_field: String,
    #[serde(default)]
    pub source_field: Option<String>,
    #[serde(default)]
    pub condition: Option<RuleCondition>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ValidationRule {
    pub fn dependency(
        category_id: Uuid,
        source_field: impl Into<String>,
        condition: RuleCondition,
        value: Option<String>,
        target_field: impl Into<String>,
    ) -> Self {
        let source_field = source_field.into();
        let target_field = target_field.into();
        Self {
            id: Uuid::new_v4(),
            category_id,
            name: format!("{}-requires-{}", source_field, target_field),
            rule_type: RuleType::Dependency,
            target_field,
            source_field: Some(source_field),
            condition: Some(condition),
            value,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
