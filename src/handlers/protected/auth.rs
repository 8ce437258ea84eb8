use axum::extract::Extension;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::permission::has_permission;
use crate::types::PermissionAction;

/// GET /api/auth/whoami - caller's profile and the actions it may perform somewhere
pub async fn whoami(Extension(auth_user): Extension<AuthUser>) -> ApiResult<Value> {
    let permissions: Vec<&str> = PermissionAction::ALL
        .iter()
        .filter(|action| has_permission(auth_user.profile(), **action, None))
        .map(|action| action.as_str())
        .collect();

    Ok(ApiResponse::success(json!({
        "userId": auth_user.user_id,
        "profile": auth_user.profile,
        "permissions": permissions,
    })))
}
