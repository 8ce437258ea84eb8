use axum::extract::{Extension, Json, State};

use super::scope::{own_path, require_global, require_on, school_path, sector_path};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{EntityPath, ProfileInput, UserProfile};
use crate::types::{PermissionAction, Role};

/// GET /api/profiles - profiles within the caller's node (manage_users)
pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<UserProfile>> {
    let store = state.store.as_ref();
    let actor = auth_user.require_profile()?;
    if actor.role == Role::Superadmin {
        require_global(Some(actor), PermissionAction::ManageUsers)?;
        return Ok(ApiResponse::success(store.list_profiles().await?));
    }

    let path = own_path(store, Some(actor))
        .await?
        .ok_or_else(|| ApiError::forbidden("Your profile is not assigned to a region, sector or school"))?;
    require_on(Some(actor), PermissionAction::ManageUsers, &path)?;
    Ok(ApiResponse::success(store.profiles_within(&path).await?))
}

/// GET /api/profiles/me
pub async fn me(Extension(auth_user): Extension<AuthUser>) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(auth_user.require_profile()?.clone()))
}

/// POST /api/profiles - manage_users on the new profile's node; superadmins need global scope
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<ProfileInput>,
) -> ApiResult<UserProfile> {
    let store = state.store.as_ref();
    let mut profile = UserProfile::from_input(payload)?;

    // Fill ancestors so the profile's path is complete
    let path = match profile.role {
        Role::Superadmin => None,
        Role::Regionadmin => Some(EntityPath::region(profile.region_id.unwrap_or_default())),
        Role::Sectoradmin => Some(sector_path(store, profile.sector_id.unwrap_or_default()).await?),
        Role::Schooladmin => Some(school_path(store, profile.school_id.unwrap_or_default()).await?),
    };
    match &path {
        Some(path) => {
            if profile.role == Role::Regionadmin && store.get_region(path.region_id).await?.is_none() {
                return Err(ApiError::field("regionId", "region does not exist"));
            }
            require_on(auth_user.profile(), PermissionAction::ManageUsers, path)?;
            profile.region_id = Some(path.region_id);
            profile.sector_id = path.sector_id;
            profile.school_id = path.school_id;
        }
        None => require_global(auth_user.profile(), PermissionAction::ManageUsers)?,
    }

    let created = store.create_profile(profile).await?;
    tracing::info!("Profile {} ({}) created by {}", created.id, created.role, auth_user.user_id);
    Ok(ApiResponse::created(created))
}
