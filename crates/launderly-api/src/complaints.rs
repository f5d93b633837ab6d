use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use launderly_db::orders::ListFilter;
use launderly_types::Role;
use launderly_types::api::{
    AdvanceQuery, AttachImageRequest, ComplaintDetail, ComplaintListQuery, CreateComplaintRequest, Page,
};
use launderly_types::models::{Actor, Complaint};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// POST /orders/{order_id}/complaints
pub async fn create_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CreateComplaintRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let detail = blocking(move || {
        Ok(lifecycle.create_complaint(actor, order_id, &req.description, &req.image_urls)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ComplaintListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = query.paging();
    let filter = ListFilter {
        student_id: (actor.role == Role::Student).then_some(actor.user_id),
        status: query.status,
    };

    let db = state.db.clone();
    let (items, total) = blocking(move || Ok(db.list_complaints(filter, &paging)?)).await?;
    Ok(Json(Page::new(items, &paging, total)))
}

pub async fn get_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(complaint_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let detail = blocking(move || {
        let complaint = visible_complaint(&db, actor, complaint_id)?;
        let image_urls = db.complaint_images(complaint_id)?;
        Ok(ComplaintDetail { complaint, image_urls })
    })
    .await?;
    Ok(Json(detail))
}

pub async fn complaint_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(complaint_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let history = blocking(move || {
        visible_complaint(&db, actor, complaint_id)?;
        Ok(db.complaint_history(complaint_id)?)
    })
    .await?;
    Ok(Json(history))
}

/// POST /complaints/{id}/advance[?from=STATUS]: with `from`, the step only
/// applies if the complaint is still in that status (409 CONFLICT otherwise).
pub async fn advance_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(complaint_id): Path<Uuid>,
    Query(query): Query<AdvanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let complaint = blocking(move || {
        Ok(match query.from {
            Some(from) => lifecycle.advance_complaint_from(actor, complaint_id, from)?,
            None => lifecycle.advance_complaint(actor, complaint_id)?,
        })
    })
    .await?;
    Ok(Json(complaint))
}

pub async fn close_complaint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(complaint_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let complaint = blocking(move || Ok(lifecycle.close_complaint(actor, complaint_id)?)).await?;
    Ok(Json(complaint))
}

pub async fn attach_image(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(complaint_id): Path<Uuid>,
    Json(req): Json<AttachImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let detail =
        blocking(move || Ok(lifecycle.attach_complaint_image(actor, complaint_id, &req.url)?)).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

fn visible_complaint(
    db: &launderly_db::Database,
    actor: Actor,
    complaint_id: Uuid,
) -> Result<Complaint, ApiError> {
    let complaint = db
        .get_complaint(complaint_id)?
        .ok_or_else(|| ApiError::NotFound(format!("complaint {complaint_id}")))?;
    if !actor.is_staff_or_admin() && complaint.student_id != actor.user_id {
        return Err(ApiError::Forbidden("complaint belongs to another student".into()));
    }
    Ok(complaint)
}
