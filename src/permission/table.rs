use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use crate::types::{PermissionAction, Role, Scope};

pub type ScopeSet = HashSet<Scope>;
pub type RolePermissions = HashMap<PermissionAction, ScopeSet>;

/// Role → action → allowed scopes. Built once, never mutated.
static ROLE_TABLE: Lazy<HashMap<Role, RolePermissions>> = Lazy::new(build_table);

fn build_table() -> HashMap<Role, RolePermissions> {
    use PermissionAction::*;
    use Scope::*;

    let superadmin: RolePermissions = PermissionAction::ALL
        .iter()
        .map(|action| (*action, HashSet::from([Global])))
        .collect();

    let regionadmin = grants(
        Region,
        &[
            ViewDashboard,
            ManageUsers,
            ManageSectors,
            ManageSchools,
            AccessReports,
            ManageTables,
            ImportData,
            ExportData,
            ApproveForms,
            ManageCategories,
        ],
    );

    let sectoradmin = grants(
        Sector,
        &[
            ViewDashboard,
            ManageUsers,
            ManageSchools,
            AccessReports,
            ManageTables,
            ImportData,
            ExportData,
            ApproveForms,
        ],
    );

    let schooladmin = grants(School, &[ViewDashboard, AccessReports, ExportData, SubmitForms]);

    HashMap::from([
        (Role::Superadmin, superadmin),
        (Role::Regionadmin, regionadmin),
        (Role::Sectoradmin, sectoradmin),
        (Role::Schooladmin, schooladmin),
    ])
}

fn grants(scope: Scope, actions: &[PermissionAction]) -> RolePermissions {
    actions
        .iter()
        .map(|action| (*action, HashSet::from([scope])))
        .collect()
}

/// Allowed scopes for a role and action; empty when either is absent from the table
pub fn allowed_scopes(role: Role, action: PermissionAction) -> ScopeSet {
    ROLE_TABLE
        .get(&role)
        .and_then(|actions| actions.get(&action))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superadmin_is_global_everywhere() {
        for action in PermissionAction::ALL {
            assert!(allowed_scopes(Role::Superadmin, action).contains(&Scope::Global));
        }
    }

    #[test]
    fn only_superadmin_manages_regions() {
        for role in [Role::Regionadmin, Role::Sectoradmin, Role::Schooladmin] {
            assert!(allowed_scopes(role, PermissionAction::ManageRegions).is_empty());
        }
    }

    #[test]
    fn school_admins_submit_but_do_not_approve() {
        assert_eq!(
            allowed_scopes(Role::Schooladmin, PermissionAction::SubmitForms),
            HashSet::from([Scope::School])
        );
        assert!(allowed_scopes(Role::Schooladmin, PermissionAction::ApproveForms).is_empty());
    }
}
