use axum::extract::{Extension, Json, Path, Query, State};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::scope::{can_see_category, own_path, require_on_category, school_path};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::{Category, CategoryInput, Column, ColumnInput, RuleCondition, ValidationRule};
use crate::permission::{can_view_school, category_visible_to};
use crate::schema::{build_schema, SchemaOptions};
use crate::store::Store;
use crate::types::PermissionAction;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    /// Only categories that apply to this school
    pub school_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInput {
    #[serde(default)]
    pub name: Option<String>,
    pub target_field: String,
    pub source_field: String,
    pub condition: RuleCondition,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

async fn load(store: &dyn Store, id: Uuid) -> Result<Category, ApiError> {
    store
        .get_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// A definition change must still compile into a validator
fn check_definition(columns: &[Column], rules: &[ValidationRule]) -> Result<(), ApiError> {
    build_schema(columns, rules, &SchemaOptions::from_config())
        .map(|_| ())
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// GET /api/categories?schoolId=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Vec<Category>> {
    let store = state.store.as_ref();
    let actor = auth_user.profile();
    let own = own_path(store, actor).await?;

    let school = match query.school_id {
        Some(id) => {
            let path = school_path(store, id).await?;
            if !can_view_school(actor, &path, own.as_ref()) {
                return Err(ApiError::forbidden("You cannot view this school"));
            }
            Some(path)
        }
        None => None,
    };

    let mut visible = Vec::new();
    for category in store.list_categories().await? {
        let keep = match &school {
            Some(path) => category_visible_to(&category, path),
            None => can_see_category(store, actor, own.as_ref(), &category).await?,
        };
        if keep {
            visible.push(category);
        }
    }
    Ok(ApiResponse::success(visible))
}

/// POST /api/categories - manage_categories on the scope node
pub async fn create(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<CategoryInput>,
) -> ApiResult<Category> {
    let category = Category::from_input(payload)?;
    require_on_category(state.store.as_ref(), auth_user.profile(), PermissionAction::ManageCategories, &category)
        .await?;

    let created = state.store.create_category(category).await?;
    tracing::info!("Category '{}' ({}) created by {}", created.name, created.id, auth_user.user_id);
    Ok(ApiResponse::created(created))
}

/// GET /api/categories/:id - with columns
pub async fn get(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    let store = state.store.as_ref();
    let category = load(store, id).await?;
    let own = own_path(store, auth_user.profile()).await?;
    if !can_see_category(store, auth_user.profile(), own.as_ref(), &category).await? {
        return Err(ApiError::forbidden("You cannot view this category"));
    }
    Ok(ApiResponse::success(category))
}

/// DELETE /api/categories/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let store = state.store.as_ref();
    let category = load(store, id).await?;
    require_on_category(store, auth_user.profile(), PermissionAction::ManageCategories, &category).await?;
    store.delete_category(id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// POST /api/categories/:id/columns - manage_tables on the scope node
pub async fn add_column(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ColumnInput>,
) -> ApiResult<Column> {
    let store = state.store.as_ref();
    let category = load(store, id).await?;
    require_on_category(store, auth_user.profile(), PermissionAction::ManageTables, &category).await?;

    let next_index = category.columns.iter().map(|c| c.order_index + 1).max().unwrap_or(0);
    let column = Column::from_input(category.id, next_index, payload)?;

    let mut columns = category.columns.clone();
    columns.push(column.clone());
    check_definition(&columns, &store.list_rules(category.id).await?)?;

    let created = store.add_column(column).await?;
    tracing::info!("Column '{}' added to category {}", created.name, category.id);
    Ok(ApiResponse::created(created))
}

/// GET /api/categories/:id/rules
pub async fn list_rules(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ValidationRule>> {
    let store = state.store.as_ref();
    let category = load(store, id).await?;
    let own = own_path(store, auth_user.profile()).await?;
    if !can_see_category(store, auth_user.profile(), own.as_ref(), &category).await? {
        return Err(ApiError::forbidden("You cannot view this category"));
    }
    Ok(ApiResponse::success(store.list_rules(id).await?))
}

/// POST /api/categories/:id/rules - dependency rule, checked against the current columns
pub async fn add_rule(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RuleInput>,
) -> ApiResult<ValidationRule> {
    let store = state.store.as_ref();
    let category = load(store, id).await?;
    require_on_category(store, auth_user.profile(), PermissionAction::ManageTables, &category).await?;

    let mut rule = ValidationRule::dependency(
        category.id,
        payload.source_field.trim(),
        payload.condition,
        payload.value,
        payload.target_field.trim(),
    );
    if let Some(name) = payload.name.filter(|n| !n.trim().is_empty()) {
        rule.name = name;
    }
    if let Some(message) = payload.message {
        rule = rule.with_message(message);
    }

    let mut rules = store.list_rules(category.id).await?;
    rules.push(rule.clone());
    check_definition(&category.columns, &rules)?;

    Ok(ApiResponse::created(store.add_rule(rule).await?))
}
