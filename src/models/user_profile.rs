use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{EntityPath, ModelError};
use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub region_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a profile (API input and spreadsheet import)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub region_id: Option<Uuid>,
    #[serde(default)]
    pub sector_id: Option<Uuid>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
}

impl UserProfile {
    pub fn from_input(input: ProfileInput) -> Result<Self, ModelError> {
        let required = match input.role {
            Role::Superadmin => None,
            Role::Regionadmin => Some(("regionId", input.region_id)),
            Role::Sectoradmin => Some(("sectorId", input.sector_id)),
            Role::Schooladmin => Some(("schoolId", input.school_id)),
        };
        if let Some((field, None)) = required {
            return Err(ModelError::ProfileScope { role: input.role.as_str(), field });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: input.user_id.unwrap_or_else(Uuid::new_v4),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            role: input.role,
            region_id: input.region_id,
            sector_id: input.sector_id,
            school_id: input.school_id,
            created_at: Utc::now(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// True when the profile's assigned entity is `path` or one of its ancestors
    pub fn is_assigned_within(&self, path: &EntityPath) -> bool {
        match self.role {
            Role::Superadmin => true,
            Role::Regionadmin => self.region_id == Some(path.region_id),
            Role::Sectoradmin => self.sector_id.is_some() && self.sector_id == path.sector_id,
            Role::Schooladmin => self.school_id.is_some() && self.school_id == path.school_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(role: Role) -> ProfileInput {
        ProfileInput {
            user_id: None,
            first_name: "Aysel".into(),
            last_name: "Mammadova".into(),
            email: Some("aysel@example.com".into()),
            role,
            region_id: None,
            sector_id: None,
            school_id: None,
        }
    }

    #[test]
    fn scoped_roles_need_their_scope_id() {
        let err = UserProfile::from_input(input(Role::Sectoradmin)).unwrap_err();
        assert_eq!(err, ModelError::ProfileScope { role: "sectoradmin", field: "sectorId" });

        let mut ok = input(Role::Sectoradmin);
        ok.sector_id = Some(Uuid::new_v4());
        assert!(UserProfile::from_input(ok).is_ok());
        assert!(UserProfile::from_input(input(Role::Superadmin)).is_ok());
    }
}
