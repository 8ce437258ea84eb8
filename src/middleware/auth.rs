use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::UserProfile;

/// Authenticated caller. `profile` is `None` when the user has no profile row,
/// which denies every permission check.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub profile: Option<UserProfile>,
}

impl AuthUser {
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Profile or 403; for endpoints that are meaningless without one
    pub fn require_profile(&self) -> Result<&UserProfile, ApiError> {
        self.profile
            .as_ref()
            .ok_or_else(|| ApiError::forbidden("No profile is assigned to this account"))
    }
}

/// JWT authentication middleware: verify the bearer token and load the caller's profile
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_jwt_from_headers(&headers).or_else(|header_err| {
        // EventSource cannot set headers; the stream endpoint passes ?token=
        extract_jwt_from_query(request.uri().query()).ok_or(header_err)
    }) {
        Ok(token) => token,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    let claims = match validate_jwt(&token) {
        Ok(claims) => claims,
        Err(e) => return ApiError::unauthorized(e.to_string()).into_response(),
    };

    let profile = match state.store.get_profile_by_user(claims.sub).await {
        Ok(profile) => profile,
        Err(e) => return ApiError::from(e).into_response(),
    };
    if profile.is_none() {
        tracing::debug!("User {} has no profile, continuing without permissions", claims.sub);
    }

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        profile,
    });
    next.run(request).await
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

fn extract_jwt_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
