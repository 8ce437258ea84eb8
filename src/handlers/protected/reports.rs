use axum::{
    body::Bytes,
    extract::{Extension, Json, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use super::scope::{can_see_category, own_path, visible_schools};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{School, UserProfile};
use crate::permission::has_permission;
use crate::reporting::{self, Filter, FilterData, ImportReport};
use crate::store::Store;
use crate::types::PermissionAction;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormReportRequest {
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(flatten)]
    pub filter: FilterData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFormsQuery {
    pub category_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSchoolsQuery {
    pub sector_id: Option<Uuid>,
}

/// Gate for actions that are scoped per record later on
fn require_somewhere(actor: Option<&UserProfile>, action: PermissionAction) -> Result<(), ApiError> {
    if has_permission(actor, action, None) {
        Ok(())
    } else {
        Err(ApiError::access_denied(action))
    }
}

/// Header-safe file name: ASCII letters, digits, dash and underscore
fn file_name(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = cleaned.trim_matches('_').to_lowercase();
    if stem.is_empty() {
        "export.xlsx".to_string()
    } else {
        format!("{}.xlsx", stem)
    }
}

fn xlsx_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    )
        .into_response()
}

async fn visible_school_map(store: &dyn Store, actor: Option<&UserProfile>) -> Result<HashMap<Uuid, School>, ApiError> {
    Ok(visible_schools(store, actor)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

/// POST /api/reports/forms - filtered, sorted and paged form entries as flat rows
pub async fn query_forms(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<FormReportRequest>,
) -> ApiResult<Vec<Value>> {
    let store = state.store.as_ref();
    let actor = auth_user.profile();
    require_somewhere(actor, PermissionAction::AccessReports)?;

    let mut filter = Filter::new();
    filter.assign(payload.filter)?;

    let schools = visible_school_map(store, actor).await?;
    let school_ids: Vec<Uuid> = schools.keys().copied().collect();
    let categories: HashMap<Uuid, String> = store
        .list_categories()
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let forms = if school_ids.is_empty() {
        vec![]
    } else {
        store.list_forms(payload.category_id, Some(&school_ids)).await?
    };
    let rows = forms
        .into_iter()
        .map(|form| {
            json!({
                "id": form.id,
                "categoryId": form.category_id,
                "categoryName": categories.get(&form.category_id),
                "schoolId": form.school_id,
                "schoolName": schools.get(&form.school_id).map(|s| s.name.as_str()),
                "status": form.status,
                "version": form.version,
                "data": form.data,
                "submittedAt": form.submitted_at,
                "approvedAt": form.approved_at,
                "updatedAt": form.updated_at,
            })
        })
        .collect();

    Ok(ApiResponse::success(filter.apply(rows)))
}

/// GET /api/reports/export/forms?categoryId= - xlsx of the category's entries the caller can see
pub async fn export_forms(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ExportFormsQuery>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();
    let actor = auth_user.profile();
    require_somewhere(actor, PermissionAction::ExportData)?;

    let category = store
        .get_category(query.category_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    let own = own_path(store, actor).await?;
    if !can_see_category(store, actor, own.as_ref(), &category).await? {
        return Err(ApiError::forbidden("You cannot view this category"));
    }

    let schools = visible_school_map(store, actor).await?;
    let school_ids: Vec<Uuid> = schools.keys().copied().collect();
    let forms = if school_ids.is_empty() {
        vec![]
    } else {
        store.list_forms(Some(category.id), Some(&school_ids)).await?
    };
    let sectors = store.list_sectors(None).await?.into_iter().map(|s| (s.id, s)).collect();

    let sheet = reporting::form_entries_sheet(&category, &forms, &schools, &sectors);
    let bytes = reporting::to_xlsx(&sheet)?;
    tracing::info!("Exported {} entries of category {} for {}", forms.len(), category.id, auth_user.user_id);
    Ok(xlsx_response(&file_name(&category.name), bytes))
}

/// GET /api/reports/export/schools?sectorId=
pub async fn export_schools(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ExportSchoolsQuery>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();
    let actor = auth_user.profile();
    require_somewhere(actor, PermissionAction::ExportData)?;

    let mut schools = visible_schools(store, actor).await?;
    if let Some(sector_id) = query.sector_id {
        schools.retain(|s| s.sector_id == sector_id);
    }
    schools.sort_by(|a, b| a.name.cmp(&b.name));
    let sectors = store.list_sectors(None).await?.into_iter().map(|s| (s.id, s)).collect();

    let bytes = reporting::to_xlsx(&reporting::schools_sheet(&schools, &sectors))?;
    Ok(xlsx_response(&file_name("schools"), bytes))
}

/// POST /api/reports/import/users - raw xlsx body
pub async fn import_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<ImportReport<UserProfile>> {
    let actor = auth_user.profile();
    require_somewhere(actor, PermissionAction::ImportData)?;
    let report = reporting::import_users(state.store.as_ref(), actor, &body).await?;
    Ok(ApiResponse::success(report))
}

/// POST /api/reports/import/schools - raw xlsx body
pub async fn import_schools(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Bytes,
) -> ApiResult<ImportReport<School>> {
    let actor = auth_user.profile();
    require_somewhere(actor, PermissionAction::ImportData)?;
    let report = reporting::import_schools(state.store.as_ref(), actor, &body).await?;
    Ok(ApiResponse::success(report))
}
