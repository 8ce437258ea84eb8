// HTTP surface. Public routes need no token; everything under /api goes through
// the JWT middleware, which attaches the caller's profile.

pub mod protected;
pub mod public;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::config;
use crate::middleware::jwt_auth_middleware;
use crate::notifications::{NotificationHub, NotificationService};
use crate::store::SharedStore;
use crate::submission::FormSubmissionService;

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub hub: NotificationHub,
    pub notifications: NotificationService,
    pub forms: FormSubmissionService,
}

impl AppState {
    pub fn new(store: SharedStore, hub: NotificationHub) -> Self {
        Self {
            notifications: NotificationService::new(store.clone(), hub.clone()),
            forms: FormSubmissionService::new(store.clone(), hub.clone()),
            store,
            hub,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = protected::routes().route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .merge(public::routes())
        .merge(api)
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = config()
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Something went wrong",
            "code": "INTERNAL_SERVER_ERROR"
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::store::MemoryStore;

    fn app() -> Router {
        router(AppState::new(Arc::new(MemoryStore::new()), NotificationHub::new(16)))
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn api_routes_reject_missing_tokens() {
        let response = app()
            .oneshot(Request::get("/api/regions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
    }
}
