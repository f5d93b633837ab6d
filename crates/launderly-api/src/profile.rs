use axum::{Extension, Json, extract::State, response::IntoResponse};

use launderly_db::Database;
use launderly_types::api::{ProfileResponse, UpdateProfileRequest};
use launderly_types::models::{Actor, User};

use crate::auth::{AppState, validate_name};
use crate::blocking;
use crate::error::ApiError;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let profile = blocking(move || {
        let user = db
            .get_user_by_id(actor.user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("user {}", actor.user_id)))?;
        profile_response(&db, user)
    })
    .await?;
    Ok(Json(profile))
}

/// PATCH /me: omitted fields are left unchanged.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(mut req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = req.name.as_deref() {
        req.name = Some(validate_name(name)?);
    }

    let db = state.db.clone();
    let profile = blocking(move || {
        if let Some(hostel_id) = req.hostel_id {
            if db.get_hostel(hostel_id)?.is_none() {
                return Err(ApiError::BadRequest(format!("unknown hostel {hostel_id}")));
            }
        }
        let user = db
            .update_profile(actor.user_id, &req)?
            .ok_or_else(|| ApiError::NotFound(format!("user {}", actor.user_id)))?;
        profile_response(&db, user)
    })
    .await?;
    Ok(Json(profile))
}

fn profile_response(db: &Database, user: User) -> Result<ProfileResponse, ApiError> {
    let staff_code = db.get_staff_profile(user.id)?.map(|p| p.staff_code);
    Ok(ProfileResponse { user, staff_code })
}
