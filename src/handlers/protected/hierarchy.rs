use axum::extract::{Extension, Json, Path, Query, State};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::scope::{own_path, require_global, require_on, school_path, sector_path};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{EntityPath, Region, School, SchoolInput, Sector};
use crate::permission::{can_view_path, can_view_region, can_view_school, can_view_sector};
use crate::types::PermissionAction;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegion {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSector {
    pub name: String,
    pub region_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorQuery {
    pub region_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolQuery {
    pub sector_id: Option<Uuid>,
}

fn required_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", "name is required"));
    }
    Ok(name.to_string())
}

fn not_visible(what: &str) -> ApiError {
    ApiError::forbidden(format!("You cannot view this {}", what))
}

/// GET /api/regions
pub async fn list_regions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<Region>> {
    let actor = auth_user.profile();
    let own = own_path(state.store.as_ref(), actor).await?;
    let regions = state
        .store
        .list_regions()
        .await?
        .into_iter()
        .filter(|r| can_view_region(actor, r.id, own.as_ref()))
        .collect();
    Ok(ApiResponse::success(regions))
}

/// POST /api/regions - superadmin only
pub async fn create_region(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<NewRegion>,
) -> ApiResult<Region> {
    require_global(auth_user.profile(), PermissionAction::ManageRegions)?;
    let region = state.store.create_region(Region::new(required_name(&payload.name)?)).await?;
    tracing::info!("Region {} created by {}", region.id, auth_user.user_id);
    Ok(ApiResponse::created(region))
}

/// GET /api/regions/:id
pub async fn get_region(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Region> {
    let region = state
        .store
        .get_region(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Region not found"))?;
    let own = own_path(state.store.as_ref(), auth_user.profile()).await?;
    if !can_view_region(auth_user.profile(), region.id, own.as_ref()) {
        return Err(not_visible("region"));
    }
    Ok(ApiResponse::success(region))
}

/// DELETE /api/regions/:id - superadmin only
pub async fn delete_region(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    require_global(auth_user.profile(), PermissionAction::ManageRegions)?;
    state.store.delete_region(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// GET /api/sectors?regionId=
pub async fn list_sectors(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SectorQuery>,
) -> ApiResult<Vec<Sector>> {
    let actor = auth_user.profile();
    let own = own_path(state.store.as_ref(), actor).await?;
    let sectors = state
        .store
        .list_sectors(query.region_id)
        .await?
        .into_iter()
        .filter(|s| can_view_sector(actor, s.region_id, s.id, own.as_ref()))
        .collect();
    Ok(ApiResponse::success(sectors))
}

/// POST /api/sectors - manage_sectors on the parent region
pub async fn create_sector(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<NewSector>,
) -> ApiResult<Sector> {
    let region = state
        .store
        .get_region(payload.region_id)
        .await?
        .ok_or_else(|| ApiError::field("regionId", "region does not exist"))?;
    require_on(auth_user.profile(), PermissionAction::ManageSectors, &EntityPath::region(region.id))?;

    let sector = state
        .store
        .create_sector(Sector::new(required_name(&payload.name)?, region.id))
        .await?;
    tracing::info!("Sector {} created in region {}", sector.id, region.id);
    Ok(ApiResponse::created(sector))
}

/// GET /api/sectors/:id
pub async fn get_sector(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Sector> {
    let sector = state
        .store
        .get_sector(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sector not found"))?;
    let own = own_path(state.store.as_ref(), auth_user.profile()).await?;
    if !can_view_sector(auth_user.profile(), sector.region_id, sector.id, own.as_ref()) {
        return Err(not_visible("sector"));
    }
    Ok(ApiResponse::success(sector))
}

/// DELETE /api/sectors/:id - manage_sectors on the sector
pub async fn delete_sector(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let path = sector_path(state.store.as_ref(), id).await?;
    require_on(auth_user.profile(), PermissionAction::ManageSectors, &path)?;
    state.store.delete_sector(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// GET /api/schools?sectorId=
pub async fn list_schools(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SchoolQuery>,
) -> ApiResult<Vec<School>> {
    let actor = auth_user.profile();
    let own = own_path(state.store.as_ref(), actor).await?;
    let sectors = state.store.list_sectors(None).await?;

    let schools = state
        .store
        .list_schools(query.sector_id)
        .await?
        .into_iter()
        .filter(|school| {
            sectors
                .iter()
                .find(|s| s.id == school.sector_id)
                .map(|s| EntityPath::school(s.region_id, s.id, school.id))
                .is_some_and(|path| can_view_path(actor, &path, own.as_ref()))
        })
        .collect();
    Ok(ApiResponse::success(schools))
}

/// POST /api/schools - manage_schools on the parent sector
pub async fn create_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(mut payload): Json<SchoolInput>,
) -> ApiResult<School> {
    let path = state
        .store
        .sector_path(payload.sector_id)
        .await?
        .ok_or_else(|| ApiError::field("sectorId", "sector does not exist"))?;
    require_on(auth_user.profile(), PermissionAction::ManageSchools, &path)?;

    payload.name = required_name(&payload.name)?;
    let school = state.store.create_school(School::from_input(payload)).await?;
    tracing::info!("School {} created in sector {}", school.id, school.sector_id);
    Ok(ApiResponse::created(school))
}

/// GET /api/schools/:id
pub async fn get_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<School> {
    let path = school_path(state.store.as_ref(), id).await?;
    let own = own_path(state.store.as_ref(), auth_user.profile()).await?;
    if !can_view_school(auth_user.profile(), &path, own.as_ref()) {
        return Err(not_visible("school"));
    }
    let school = state
        .store
        .get_school(id)
        .await?
        .ok_or_else(|| ApiError::not_found("School not found"))?;
    Ok(ApiResponse::success(school))
}

/// DELETE /api/schools/:id - manage_schools on the school
pub async fn delete_school(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let path = school_path(state.store.as_ref(), id).await?;
    require_on(auth_user.profile(), PermissionAction::ManageSchools, &path)?;
    state.store.delete_school(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
