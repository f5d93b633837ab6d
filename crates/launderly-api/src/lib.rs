//! HTTP surface: axum handlers, bearer-token middleware and the router.
//!
//! Handlers do no state-machine work themselves. Every lifecycle operation
//! is delegated to [`LifecycleManager`](launderly_lifecycle::LifecycleManager)
//! on the blocking pool, with the caller's [`Actor`](launderly_types::models::Actor)
//! taken from the verified token.

pub mod admin;
pub mod auth;
pub mod complaints;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod orders;
pub mod profile;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/register/staff", post(auth::register_staff))
        .route("/auth/login", post(auth::login))
        .route("/hostels", get(admin::list_hostels))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/me", get(profile::get_profile).patch(profile::update_profile))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/history", get(orders::order_history))
        .route(
            "/orders/{order_id}/items/{item_id}/images",
            post(orders::attach_item_image),
        )
        .route("/orders/{order_id}/pending", post(orders::mark_pending))
        .route("/orders/{order_id}/complete", post(orders::complete))
        .route("/orders/{order_id}/complaints", post(complaints::create_complaint))
        .route("/scan", post(orders::scan))
        .route("/complaints", get(complaints::list_complaints))
        .route("/complaints/{complaint_id}", get(complaints::get_complaint))
        .route("/complaints/{complaint_id}/history", get(complaints::complaint_history))
        .route("/complaints/{complaint_id}/advance", post(complaints::advance_complaint))
        .route("/complaints/{complaint_id}/close", post(complaints::close_complaint))
        .route("/complaints/{complaint_id}/images", post(complaints::attach_image))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/hostels", get(admin::list_hostels).post(admin::create_hostel))
        .route(
            "/admin/hostels/{hostel_id}",
            put(admin::update_hostel).delete(admin::delete_hostel),
        )
        .route(
            "/admin/staff-codes",
            get(admin::list_staff_codes).post(admin::create_staff_code),
        )
        .route(
            "/admin/staff-codes/{code_id}",
            patch(admin::update_staff_code).delete(admin::delete_staff_code),
        )
        .route("/admin/dashboard", get(admin::dashboard))
        .layer(from_fn(middleware::require_admin))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
