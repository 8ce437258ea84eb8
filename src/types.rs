/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a signed-in user. Determines the default permission scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Regionadmin,
    Sectoradmin,
    Schooladmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Regionadmin => "regionadmin",
            Role::Sectoradmin => "sectoradmin",
            Role::Schooladmin => "schooladmin",
        }
    }

    /// Entity level a role is assigned at
    pub fn home_scope(&self) -> Scope {
        match self {
            Role::Superadmin => Scope::Global,
            Role::Regionadmin => Scope::Region,
            Role::Sectoradmin => Scope::Sector,
            Role::Schooladmin => Scope::School,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "regionadmin" => Ok(Role::Regionadmin),
            "sectoradmin" => Ok(Role::Sectoradmin),
            "schooladmin" => Ok(Role::Schooladmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Entity level at which an action is authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Region,
    Sector,
    School,
}

/// Closed set of actions gated by the permission evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    ViewDashboard,
    ManageUsers,
    ManageRegions,
    ManageSectors,
    ManageSchools,
    AccessReports,
    ManageTables,
    EditSettings,
    ImportData,
    ExportData,
    ApproveForms,
    SubmitForms,
    ManageCategories,
}

impl PermissionAction {
    pub const ALL: [PermissionAction; 13] = [
        PermissionAction::ViewDashboard,
        PermissionAction::ManageUsers,
        PermissionAction::ManageRegions,
        PermissionAction::ManageSectors,
        PermissionAction::ManageSchools,
        PermissionAction::AccessReports,
        PermissionAction::ManageTables,
        PermissionAction::EditSettings,
        PermissionAction::ImportData,
        PermissionAction::ExportData,
        PermissionAction::ApproveForms,
        PermissionAction::SubmitForms,
        PermissionAction::ManageCategories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::ViewDashboard => "view_dashboard",
            PermissionAction::ManageUsers => "manage_users",
            PermissionAction::ManageRegions => "manage_regions",
            PermissionAction::ManageSectors => "manage_sectors",
            PermissionAction::ManageSchools => "manage_schools",
            PermissionAction::AccessReports => "access_reports",
            PermissionAction::ManageTables => "manage_tables",
            PermissionAction::EditSettings => "edit_settings",
            PermissionAction::ImportData => "import_data",
            PermissionAction::ExportData => "export_data",
            PermissionAction::ApproveForms => "approve_forms",
            PermissionAction::SubmitForms => "submit_forms",
            PermissionAction::ManageCategories => "manage_categories",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown permission action: {}", s))
    }
}

/// Approval status of a form entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "form_status", rename_all = "lowercase")]
pub enum FormStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Submitted => "submitted",
            FormStatus::Approved => "approved",
            FormStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the submitter wants the entry to become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitIntent {
    Draft,
    Submit,
}

impl SubmitIntent {
    pub fn target_status(&self) -> FormStatus {
        match self {
            SubmitIntent::Draft => FormStatus::Draft,
            SubmitIntent::Submit => FormStatus::Submitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Superadmin, Role::Regionadmin, Role::Sectoradmin, Role::Schooladmin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("teacher".parse::<Role>().is_err());
    }

    #[test]
    fn action_names_match_wire_format() {
        let json = serde_json::to_string(&PermissionAction::ManageTables).unwrap();
        assert_eq!(json, "\"manage_tables\"");
        assert_eq!("approve_forms".parse::<PermissionAction>().unwrap(), PermissionAction::ApproveForms);
    }
}
