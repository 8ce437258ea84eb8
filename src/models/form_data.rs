use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::FormStatus;

/// One school's answers for one category; the current pointer of its version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    pub id: Uuid,
    pub category_id: Uuid,
    pub school_id: Uuid,
    pub data: Value,
    pub status: FormStatus,
    pub version: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormData {
    pub fn new(category_id: Uuid, school_id: Uuid, data: Map<String, Value>, status: FormStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            category_id,
            school_id,
            data: Value::Object(data),
            status,
            version: 1,
            submitted_at: None,
            approved_at: None,
            approved_by: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field map of the entry; empty when the stored value is not an object
    pub fn fields(&self) -> Map<String, Value> {
        match &self.data {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Immutable snapshot of a form entry at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormEntryVersion {
    pub id: Uuid,
    pub form_entry_id: Uuid,
    pub version: i32,
    pub data: Value,
    pub status: FormStatus,
    pub checksum: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl FormEntryVersion {
    pub fn snapshot(entry: &FormData, created_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_entry_id: entry.id,
            version: entry.version,
            data: entry.data.clone(),
            status: entry.status,
            checksum: data_checksum(&entry.data),
            created_by,
            created_at: entry.updated_at,
        }
    }
}

/// Hex SHA-256 of the canonical JSON encoding (object keys are sorted)
pub fn data_checksum(data: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_ignores_key_order() {
        let a = json!({"b": 1, "a": "x"});
        let b = json!({"a": "x", "b": 1});
        assert_eq!(data_checksum(&a), data_checksum(&b));
        assert_ne!(data_checksum(&a), data_checksum(&json!({"a": "y", "b": 1})));
    }

    #[test]
    fn snapshot_copies_current_state() {
        let mut map = Map::new();
        map.insert("Student Count".into(), json!(450));
        let entry = FormData::new(Uuid::new_v4(), Uuid::new_v4(), map, FormStatus::Submitted);
        let version = FormEntryVersion::snapshot(&entry, None);
        assert_eq!(version.form_entry_id, entry.id);
        assert_eq!(version.version, 1);
        assert_eq!(version.status, FormStatus::Submitted);
        assert_eq!(version.data, entry.data);
    }
}
