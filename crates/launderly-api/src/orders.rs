use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use launderly_db::orders::ListFilter;
use launderly_types::Role;
use launderly_types::api::{AttachImageRequest, CreateOrderRequest, OrderListQuery, Page, ScanRequest};
use launderly_types::models::{Actor, Order};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

/// POST /orders: a student places an order. Returns the items and the QR
/// payload to print.
pub async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let detail = blocking(move || Ok(lifecycle.create_order(actor, req.items)?)).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /orders: students see their own orders, staff and admins see all.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = query.paging();
    let filter = ListFilter {
        student_id: (actor.role == Role::Student).then_some(actor.user_id),
        status: query.status,
    };

    let db = state.db.clone();
    let (items, total) = blocking(move || Ok(db.list_orders(filter, &paging)?)).await?;
    Ok(Json(Page::new(items, &paging, total)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let detail = blocking(move || {
        let detail = db
            .get_order_detail(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("order {order_id}")))?;
        check_order_access(actor, &detail.order)?;
        Ok(detail)
    })
    .await?;
    Ok(Json(detail))
}

pub async fn order_history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let history = blocking(move || {
        let order = db
            .get_order(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("order {order_id}")))?;
        check_order_access(actor, &order)?;
        Ok(db.order_history(order_id)?)
    })
    .await?;
    Ok(Json(history))
}

pub async fn attach_item_image(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AttachImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let item = blocking(move || Ok(lifecycle.attach_item_image(actor, order_id, item_id, &req.url)?)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /scan: staff scans the QR payload printed on a bag.
pub async fn scan(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let order = blocking(move || Ok(lifecycle.scan(actor, req.payload.trim())?)).await?;
    Ok(Json(order))
}

pub async fn mark_pending(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let order = blocking(move || Ok(lifecycle.mark_pending(actor, order_id)?)).await?;
    Ok(Json(order))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lifecycle = state.lifecycle.clone();
    let order = blocking(move || Ok(lifecycle.complete(actor, order_id)?)).await?;
    Ok(Json(order))
}

fn check_order_access(actor: Actor, order: &Order) -> Result<(), ApiError> {
    if actor.is_staff_or_admin() || order.student_id == actor.user_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("order {} belongs to another student", order.code)))
    }
}
