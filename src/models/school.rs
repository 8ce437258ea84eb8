use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub sector_id: Uuid,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a school (API input and spreadsheet import)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolInput {
    pub name: String,
    pub sector_id: Uuid,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl School {
    pub fn from_input(input: SchoolInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            sector_id: input.sector_id,
            address: input.address,
            email: input.email,
            phone: input.phone,
            created_at: Utc::now(),
        }
    }
}
