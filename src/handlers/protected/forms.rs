use axum::extract::{Extension, Json, Path, Query, State};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::scope::{own_path, school_path, visible_schools};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{FormData, FormEntryVersion};
use crate::permission::can_view_school;
use crate::store::Store;
use crate::submission::SubmitRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormQuery {
    pub category_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Token cancelled when the handler future is dropped (client went away)
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

async fn load_visible(store: &dyn Store, auth_user: &AuthUser, id: Uuid) -> Result<FormData, ApiError> {
    let form = store
        .get_form(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Form entry not found"))?;
    let path = school_path(store, form.school_id).await?;
    let own = own_path(store, auth_user.profile()).await?;
    if !can_view_school(auth_user.profile(), &path, own.as_ref()) {
        return Err(ApiError::forbidden("You cannot view this form entry"));
    }
    Ok(form)
}

/// GET /api/forms?categoryId=&schoolId= - entries of schools the caller can see
pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<FormQuery>,
) -> ApiResult<Vec<FormData>> {
    let store = state.store.as_ref();
    let mut school_ids: Vec<Uuid> = visible_schools(store, auth_user.profile())
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if let Some(school_id) = query.school_id {
        school_ids.retain(|id| *id == school_id);
    }
    if school_ids.is_empty() {
        return Ok(ApiResponse::success(vec![]));
    }
    let forms = store.list_forms(query.category_id, Some(&school_ids)).await?;
    Ok(ApiResponse::success(forms))
}

/// POST /api/forms - save a draft or submit for review
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<SubmitRequest>,
) -> ApiResult<FormData> {
    let (cancel, _guard) = request_token();
    let created = payload.existing_id.is_none();
    let form = state.forms.submit(auth_user.profile(), payload, cancel).await?;
    if created && form.version == 1 {
        Ok(ApiResponse::created(form))
    } else {
        Ok(ApiResponse::success(form))
    }
}

/// GET /api/forms/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<FormData> {
    Ok(ApiResponse::success(load_visible(state.store.as_ref(), &auth_user, id).await?))
}

/// POST /api/forms/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<FormData> {
    let (cancel, _guard) = request_token();
    Ok(ApiResponse::success(state.forms.approve(auth_user.profile(), id, cancel).await?))
}

/// POST /api/forms/:id/reject - `{ "reason": "..." }`
pub async fn reject(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectRequest>>,
) -> ApiResult<FormData> {
    let (cancel, _guard) = request_token();
    let reason = payload.and_then(|Json(body)| body.reason);
    Ok(ApiResponse::success(state.forms.reject(auth_user.profile(), id, reason, cancel).await?))
}

/// GET /api/forms/:id/versions - history, oldest first
pub async fn versions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<FormEntryVersion>> {
    let store = state.store.as_ref();
    let form = load_visible(store, &auth_user, id).await?;
    Ok(ApiResponse::success(store.list_versions(form.id).await?))
}
