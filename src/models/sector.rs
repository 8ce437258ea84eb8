use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub id: Uuid,
    pub name: String,
    pub region_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Sector {
    pub fn new(name: impl Into<String>, region_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            region_id,
            created_at: Utc::now(),
        }
    }
}
