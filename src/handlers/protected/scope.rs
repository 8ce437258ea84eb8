// Lookups shared by handlers that need to know where a caller or a record sits.

use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Category, CategoryScope, EntityPath, School, UserProfile};
use crate::permission::{allowed_scopes, can_view_path, has_permission_on};
use crate::store::Store;
use crate::types::{PermissionAction, Role, Scope};

/// Path of the caller's own node; `None` for superadmins and profile-less callers
pub async fn own_path(store: &dyn Store, actor: Option<&UserProfile>) -> Result<Option<EntityPath>, ApiError> {
    match actor {
        Some(profile) => Ok(store.profile_path(profile).await?),
        None => Ok(None),
    }
}

pub async fn school_path(store: &dyn Store, school_id: Uuid) -> Result<EntityPath, ApiError> {
    store
        .school_path(school_id)
        .await?
        .ok_or_else(|| ApiError::not_found("School not found"))
}

pub async fn sector_path(store: &dyn Store, sector_id: Uuid) -> Result<EntityPath, ApiError> {
    store
        .sector_path(sector_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sector not found"))
}

/// `action` on `path`, or 403
pub fn require_on(actor: Option<&UserProfile>, action: PermissionAction, path: &EntityPath) -> Result<(), ApiError> {
    if has_permission_on(actor, action, path) {
        Ok(())
    } else {
        Err(ApiError::access_denied(action))
    }
}

/// `action` with global scope, or 403
pub fn require_global(actor: Option<&UserProfile>, action: PermissionAction) -> Result<(), ApiError> {
    let global = actor.is_some_and(|p| allowed_scopes(p.role, action).contains(&Scope::Global));
    if global {
        Ok(())
    } else {
        Err(ApiError::access_denied(action))
    }
}

/// Every school the caller can see
pub async fn visible_schools(store: &dyn Store, actor: Option<&UserProfile>) -> Result<Vec<School>, ApiError> {
    let Some(profile) = actor else {
        return Ok(vec![]);
    };
    if profile.role == Role::Superadmin {
        return Ok(store.list_schools(None).await?);
    }
    match store.profile_path(profile).await? {
        Some(path) => schools_within(store, &path).await,
        None => Ok(vec![]),
    }
}

/// Schools at or below `path`
pub async fn schools_within(store: &dyn Store, path: &EntityPath) -> Result<Vec<School>, ApiError> {
    if let Some(school_id) = path.school_id {
        return Ok(store.get_school(school_id).await?.into_iter().collect());
    }
    if let Some(sector_id) = path.sector_id {
        return Ok(store.list_schools(Some(sector_id)).await?);
    }
    let mut schools = Vec::new();
    for sector in store.list_sectors(Some(path.region_id)).await? {
        schools.extend(store.list_schools(Some(sector.id)).await?);
    }
    Ok(schools)
}

/// Node a category is scoped to; `None` for global categories
pub async fn category_path(store: &dyn Store, category: &Category) -> Result<Option<EntityPath>, ApiError> {
    match category.scope()? {
        CategoryScope::Global => Ok(None),
        CategoryScope::Region(id) => Ok(Some(EntityPath::region(id))),
        CategoryScope::Sector(id) => sector_path(store, id).await.map(Some),
        CategoryScope::School(id) => school_path(store, id).await.map(Some),
    }
}

/// Global categories are visible to every profile; scoped ones when the caller can see their node
pub async fn can_see_category(
    store: &dyn Store,
    actor: Option<&UserProfile>,
    own: Option<&EntityPath>,
    category: &Category,
) -> Result<bool, ApiError> {
    if actor.is_none() {
        return Ok(false);
    }
    Ok(match category_path(store, category).await? {
        None => true,
        Some(path) => can_view_path(actor, &path, own),
    })
}

/// Category changes need `action` on the category's node, or global scope for global categories
pub async fn require_on_category(
    store: &dyn Store,
    actor: Option<&UserProfile>,
    action: PermissionAction,
    category: &Category,
) -> Result<(), ApiError> {
    match category_path(store, category).await? {
        Some(path) => require_on(actor, action, &path),
        None => require_global(actor, action),
    }
}
