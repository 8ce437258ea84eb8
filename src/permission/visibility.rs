use crate::models::{Category, EntityPath, UserProfile};
use crate::types::Role;
use uuid::Uuid;

/// Whether `caller` may see the node at `path`.
///
/// Admins see their own subtree; scoped admins also see the ancestors of their node so
/// that names can be resolved. Nobody sees siblings.
pub fn can_view_path(caller: Option<&UserProfile>, path: &EntityPath, ancestors_of_caller: Option<&EntityPath>) -> bool {
    let Some(profile) = caller else {
        return false;
    };

    if profile.role == Role::Superadmin || profile.is_assigned_within(path) {
        return true;
    }

    // Ancestor nodes of the caller's own node
    match ancestors_of_caller {
        Some(own) => is_prefix(path, own),
        None => false,
    }
}

pub fn can_view_region(caller: Option<&UserProfile>, region_id: Uuid, own: Option<&EntityPath>) -> bool {
    can_view_path(caller, &EntityPath::region(region_id), own)
}

pub fn can_view_sector(caller: Option<&UserProfile>, region_id: Uuid, sector_id: Uuid, own: Option<&EntityPath>) -> bool {
    can_view_path(caller, &EntityPath::sector(region_id, sector_id), own)
}

pub fn can_view_school(caller: Option<&UserProfile>, path: &EntityPath, own: Option<&EntityPath>) -> bool {
    path.school_id.is_some() && can_view_path(caller, path, own)
}

fn is_prefix(candidate: &EntityPath, of: &EntityPath) -> bool {
    if candidate.region_id != of.region_id {
        return false;
    }
    match (candidate.sector_id, candidate.school_id) {
        (None, None) => true,
        (Some(sector), None) => of.sector_id == Some(sector),
        (Some(sector), Some(school)) => of.sector_id == Some(sector) && of.school_id == Some(school),
        (None, Some(_)) => false,
    }
}

/// Whether a category applies to the node at `path`
pub fn category_visible_to(category: &Category, path: &EntityPath) -> bool {
    match category.scope() {
        Ok(scope) => scope.covers(path),
        Err(e) => {
            tracing::warn!("Category {} has an invalid scope: {}", category.id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryScope, ProfileInput};

    fn sector_admin(sector: Uuid) -> UserProfile {
        UserProfile::from_input(ProfileInput {
            user_id: None,
            first_name: "S".into(),
            last_name: "A".into(),
            email: None,
            role: Role::Sectoradmin,
            region_id: None,
            sector_id: Some(sector),
            school_id: None,
        })
        .expect("valid profile")
    }

    #[test]
    fn sector_admin_sees_own_subtree_and_region() {
        let (region, sector, school) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let admin = sector_admin(sector);
        let own = EntityPath::sector(region, sector);

        assert!(can_view_path(Some(&admin), &EntityPath::school(region, sector, school), Some(&own)));
        assert!(can_view_region(Some(&admin), region, Some(&own)));
        assert!(!can_view_sector(Some(&admin), region, Uuid::new_v4(), Some(&own)));
        assert!(!can_view_path(None, &EntityPath::region(region), None));
    }

    #[test]
    fn multi_scope_categories_are_hidden() {
        let region = Uuid::new_v4();
        let mut category = Category::new("Broken", CategoryScope::Region(region), None);
        category.sector_id = Some(Uuid::new_v4());
        assert!(!category_visible_to(&category, &EntityPath::region(region)));
    }
}
