pub mod category;
pub mod column;
pub mod form_data;
pub mod notification;
pub mod region;
pub mod school;
pub mod sector;
pub mod user_profile;
pub mod validation_rule;

pub use category::{Category, CategoryInput, CategoryScope};
pub use column::{Column, ColumnInput, ColumnType};
pub use form_data::{FormData, FormEntryVersion};
pub use notification::{DeliveryChannel, DeliveryJob, DeliveryStatus, Notification, NewNotification};
pub use region::Region;
pub use school::{School, SchoolInput};
pub use sector::Sector;
pub use user_profile::{ProfileInput, UserProfile};
pub use validation_rule::{RuleCondition, RuleType, ValidationRule};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Construction-time invariant violations on domain records
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("category may set at most one of regionId, sectorId, schoolId")]
    ScopeConflict,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("column '{0}' of type {1} needs at least one option")]
    MissingOptions(String, &'static str),

    #[error("profile with role {role} must have {field} set")]
    ProfileScope { role: &'static str, field: &'static str },
}

/// Ancestor ids of a node in the region → sector → school tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPath {
    pub region_id: Uuid,
    pub sector_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
}

impl EntityPath {
    pub fn region(region_id: Uuid) -> Self {
        Self { region_id, sector_id: None, school_id: None }
    }

    pub fn sector(region_id: Uuid, sector_id: Uuid) -> Self {
        Self { region_id, sector_id: Some(sector_id), school_id: None }
    }

    pub fn school(region_id: Uuid, sector_id: Uuid, school_id: Uuid) -> Self {
        Self { region_id, sector_id: Some(sector_id), school_id: Some(school_id) }
    }

    /// True when `id` is this node or one of its ancestors
    pub fn contains(&self, id: Uuid) -> bool {
        self.region_id == id || self.sector_id == Some(id) || self.school_id == Some(id)
    }
}
