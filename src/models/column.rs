use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "column_type", rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    Email,
    Phone,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Textarea => "textarea",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Select => "select",
            ColumnType::Radio => "radio",
            ColumnType::Checkbox => "checkbox",
            ColumnType::Email => "email",
            ColumnType::Phone => "phone",
        }
    }

    pub fn needs_options(&self) -> bool {
        matches!(self, ColumnType::Select | ColumnType::Radio)
    }
}

/// One typed field of a category's form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub min_length: Option<i32>,
    #[serde(default)]
    pub max_length: Option<i32>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Keeps allow-listed formatting tags; every other text field is stripped to plain text
    #[serde(default)]
    pub rich_text: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInput {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub min_length: Option<i32>,
    #[serde(default)]
    pub max_length: Option<i32>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Keeps allow-listed formatting tags; every other text field is stripped to plain text
    #[serde(default)]
    pub rich_text: bool,
}

impl Column {
    pub fn new(category_id: Uuid, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: Uuid::new_v4(),
            category_id,
            name: name.into(),
            column_type,
            required: false,
            options: Vec::new(),
            description: None,
            order_index: 0,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            pattern: None,
            rich_text: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn rich_text(mut self) -> Self {
        self.rich_text = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_input(category_id: Uuid, order_index: i32, input: ColumnInput) -> Result<Self, ModelError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ModelError::MissingField("name"));
        }
        let options: Vec<String> = input
            .options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if input.column_type.needs_options() && options.is_empty() {
            return Err(ModelError::MissingOptions(name, input.column_type.as_str()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            category_id,
            name,
            column_type: input.column_type,
            required: input.required,
            options,
            description: input.description,
            order_index: input.order_index.unwrap_or(order_index),
            min_length: input.min_length,
            max_length: input.max_length,
            min_value: input.min_value,
            max_value: input.max_value,
            pattern: input.pattern,
            rich_text: input.rich_text,
        })
    }
}
