// Permission evaluator: (caller, action, target) → allow/deny over a static role table.
// Pure functions only; absence of a caller denies everything.

pub mod table;
pub mod visibility;

pub use table::allowed_scopes;
pub use visibility::{can_view_path, can_view_region, can_view_school, can_view_sector, category_visible_to};

use uuid::Uuid;

use crate::models::{EntityPath, UserProfile};
use crate::types::{PermissionAction, Scope};

/// Decide whether `caller` may perform `action`, optionally on a specific entity id.
///
/// Without a target the answer is "permitted in principle at the caller's own scope".
/// With a target the caller's assigned id at an allowed scope must equal it.
pub fn has_permission(caller: Option<&UserProfile>, action: PermissionAction, target: Option<Uuid>) -> bool {
    let Some(profile) = caller else {
        return false;
    };

    let scopes = allowed_scopes(profile.role, action);
    if scopes.contains(&Scope::Global) {
        return true;
    }

    match target {
        None => !scopes.is_empty(),
        Some(target) => scopes.iter().any(|scope| assigned_id(profile, *scope) == Some(target)),
    }
}

/// Check `action` against every node on `path` (region, sector, school)
pub fn has_permission_on(caller: Option<&UserProfile>, action: PermissionAction, path: &EntityPath) -> bool {
    [Some(path.region_id), path.sector_id, path.school_id]
        .into_iter()
        .flatten()
        .any(|id| has_permission(caller, action, Some(id)))
}

fn assigned_id(profile: &UserProfile, scope: Scope) -> Option<Uuid> {
    match scope {
        Scope::Global => None,
        Scope::Region => profile.region_id,
        Scope::Sector => profile.sector_id,
        Scope::School => profile.school_id,
    }
}
