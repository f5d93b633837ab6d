//! Admin-only configuration: hostels, staff enrollment codes and the
//! dashboard. `GET /hostels` is also mounted publicly for sign-up forms.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use launderly_db::queries::{
    hostel_name_taken, insert_hostel, insert_staff_code, staff_code_by_code,
    update_hostel as update_hostel_row,
};
use launderly_db::{Connection, Database};
use launderly_types::normalize_staff_code;
use launderly_types::api::{CreateStaffCodeRequest, HostelRequest, StaffCodeList, UpdateStaffCodeRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

const CODE_PREFIX: &str = "STF-";
const CODE_LEN: usize = 8;
// No 0/O or 1/I, codes are read off paper.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// -- Hostels --

pub async fn list_hostels(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let hostels = blocking(move || Ok(db.list_hostels()?)).await?;
    Ok(Json(hostels))
}

pub async fn create_hostel(
    State(state): State<AppState>,
    Json(req): Json<HostelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, address) = validate_hostel(req)?;
    let db = state.db.clone();
    let hostel = blocking(move || {
        db.with_tx(|conn| -> Result<_, ApiError> {
            ensure_hostel_name_free(conn, &name, None)?;
            Ok(insert_hostel(conn, &name, address.as_deref(), Utc::now())?)
        })
    })
    .await?;

    info!("Hostel {} created ({})", hostel.name, hostel.id);
    Ok((StatusCode::CREATED, Json(hostel)))
}

pub async fn update_hostel(
    State(state): State<AppState>,
    Path(hostel_id): Path<Uuid>,
    Json(req): Json<HostelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, address) = validate_hostel(req)?;
    let db = state.db.clone();
    let hostel = blocking(move || {
        db.with_tx(|conn| {
            ensure_hostel_name_free(conn, &name, Some(hostel_id))?;
            update_hostel_row(conn, hostel_id, &name, address.as_deref())?
                .ok_or_else(|| ApiError::NotFound(format!("hostel {hostel_id}")))
        })
    })
    .await?;
    Ok(Json(hostel))
}

/// Residents keep their accounts; their hostel is cleared.
pub async fn delete_hostel(
    State(state): State<AppState>,
    Path(hostel_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let deleted = blocking(move || Ok(db.delete_hostel(hostel_id)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("hostel {hostel_id}")));
    }
    info!("Hostel {} deleted", hostel_id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_hostel(req: HostelRequest) -> Result<(String, Option<String>), ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::BadRequest("hostel name must be 1-100 characters".into()));
    }
    let address = req
        .address
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    Ok((name, address))
}

fn ensure_hostel_name_free(conn: &Connection, name: &str, except: Option<Uuid>) -> Result<(), ApiError> {
    if hostel_name_taken(conn, name, except)? {
        return Err(ApiError::Conflict(format!("hostel {name} already exists")));
    }
    Ok(())
}

// -- Staff codes --

pub async fn list_staff_codes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let codes = blocking(move || Ok(db.list_staff_codes()?)).await?;
    Ok(Json(StaffCodeList { codes }))
}

/// POST /admin/staff-codes: uses the given code, or generates
/// `STF-XXXXXXXX` when none is supplied.
pub async fn create_staff_code(
    State(state): State<AppState>,
    Json(req): Json<CreateStaffCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = req.code.as_deref().map(validate_code).transpose()?;

    let db = state.db.clone();
    let staff_code = blocking(move || {
        db.with_tx(|conn| {
            let code = match requested {
                Some(code) => {
                    if code_exists(conn, &code)? {
                        return Err(ApiError::Conflict(format!("staff code {code} already exists")));
                    }
                    code
                }
                None => loop {
                    let candidate = generate_code();
                    if !code_exists(conn, &candidate)? {
                        break candidate;
                    }
                },
            };
            Ok(insert_staff_code(conn, &code, Utc::now())?)
        })
    })
    .await?;

    info!("Staff code {} created", staff_code.code);
    Ok((StatusCode::CREATED, Json(staff_code)))
}

/// PATCH /admin/staff-codes/{code_id}: enable or disable an unclaimed code.
pub async fn update_staff_code(
    State(state): State<AppState>,
    Path(code_id): Path<Uuid>,
    Json(req): Json<UpdateStaffCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let staff_code = blocking(move || {
        ensure_unclaimed(&db, code_id)?;
        if !db.set_staff_code_status(code_id, req.status)? {
            return Err(ApiError::Conflict(format!("staff code {code_id} was claimed")));
        }
        db.get_staff_code(code_id)?
            .ok_or_else(|| ApiError::NotFound(format!("staff code {code_id}")))
    })
    .await?;

    info!("Staff code {} set to {}", staff_code.code, staff_code.status);
    Ok(Json(staff_code))
}

pub async fn delete_staff_code(
    State(state): State<AppState>,
    Path(code_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    blocking(move || {
        ensure_unclaimed(&db, code_id)?;
        if !db.delete_staff_code(code_id)? {
            return Err(ApiError::Conflict(format!("staff code {code_id} was claimed")));
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_unclaimed(db: &Database, code_id: Uuid) -> Result<(), ApiError> {
    let existing = db
        .get_staff_code(code_id)?
        .ok_or_else(|| ApiError::NotFound(format!("staff code {code_id}")))?;
    if existing.claimed {
        return Err(ApiError::Conflict(format!(
            "staff code {} is claimed and cannot be changed",
            existing.code
        )));
    }
    Ok(())
}

fn code_exists(conn: &Connection, code: &str) -> Result<bool, ApiError> {
    Ok(staff_code_by_code(conn, code)?.is_some())
}

fn validate_code(code: &str) -> Result<String, ApiError> {
    let code = normalize_staff_code(code);
    let valid = (4..=32).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(ApiError::BadRequest(
            "staff code must be 4-32 letters, digits or dashes".into(),
        ));
    }
    Ok(code)
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("{CODE_PREFIX}{suffix}")
}

// -- Dashboard --

pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let dashboard = blocking(move || Ok(db.dashboard()?)).await?;
    Ok(Json(dashboard))
}
