use axum::{
    extract::{Extension, Json, Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Notification;
use crate::notifications::MassNotification;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Client session id; reconnecting with the same id replaces the old stream
    pub session: Option<String>,
}

/// GET /api/notifications - caller's own, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::success(state.notifications.list(auth_user.user_id).await?))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let count = state.notifications.unread_count(auth_user.user_id).await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    Ok(ApiResponse::success(state.notifications.mark_read(auth_user.user_id, id).await?))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let updated = state.notifications.mark_all_read(auth_user.user_id).await?;
    Ok(ApiResponse::success(json!({ "updated": updated })))
}

/// POST /api/notifications/mass - everyone within a node (manage_users on it)
pub async fn mass_notify(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<MassNotification>,
) -> ApiResult<Value> {
    let sent = state.notifications.mass_notify(auth_user.profile(), payload).await?;
    tracing::info!("Mass notification from {} reached {} users", auth_user.user_id, sent.len());
    Ok(ApiResponse::created(json!({ "recipients": sent.len() })))
}

fn sse_event(name: &str, payload: &impl Serialize) -> Event {
    Event::default().event(name).json_data(payload).unwrap_or_else(|e| {
        tracing::warn!("Could not encode {} event: {}", name, e);
        Event::default().event(name).data("{}")
    })
}

/// GET /api/notifications/stream?session= - server-sent events.
///
/// Every (re)connect starts with a `refresh_notifications` snapshot so the client can
/// reconcile whatever it missed while disconnected.
pub async fn stream(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = query.session.unwrap_or_else(|| Uuid::new_v4().to_string());
    // Subscribe before reading the snapshot so nothing falls between the two
    let subscription = state.hub.subscribe(&session, auth_user.user_id);

    let notifications = state.notifications.list(auth_user.user_id).await?;
    let unread = state.notifications.unread_count(auth_user.user_id).await?;
    let snapshot = sse_event(
        "refresh_notifications",
        &json!({ "unreadCount": unread, "notifications": notifications }),
    );
    tracing::debug!("Realtime stream opened for {} (session {})", auth_user.user_id, session);

    let live = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next().await?;
        Some((Ok(sse_event(event.name(), &event)), subscription))
    });

    let events = stream::once(async move { Ok(snapshot) }).chain(live);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
