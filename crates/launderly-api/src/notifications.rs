use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use launderly_types::api::{NotificationQuery, Page};
use launderly_types::models::Actor;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// GET /notifications: the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = query.paging();
    let unread_only = query.unread_only;
    let db = state.db.clone();
    let (items, total) =
        blocking(move || Ok(db.list_notifications(actor.user_id, unread_only, &paging)?)).await?;
    Ok(Json(Page::new(items, &paging, total)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let found = blocking(move || Ok(db.mark_notification_read(notification_id, actor.user_id)?)).await?;
    if !found {
        return Err(ApiError::NotFound(format!("notification {notification_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let updated = blocking(move || Ok(db.mark_all_notifications_read(actor.user_id)?)).await?;
    Ok(Json(json!({ "updated": updated })))
}
