use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use launderly_db::queries::{email_taken, hostel_by_id, insert_user};
use launderly_db::{Database, NewUser};
use launderly_lifecycle::LifecycleManager;
use launderly_types::{Role, normalize_staff_code};
use launderly_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, StaffRegisterRequest};
use launderly_types::models::User;

use crate::blocking;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub lifecycle: LifecycleManager,
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, token_ttl: Duration) -> AppState {
        Arc::new(Self {
            lifecycle: LifecycleManager::new(db.clone()),
            db,
            jwt_secret,
            token_ttl,
        })
    }
}

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let name = validate_name(&req.name)?;
    validate_password(&req.password)?;

    let db = state.db.clone();
    let user = blocking(move || {
        let password_hash = hash_password(&req.password)?;
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name,
            role: Role::Student,
            hostel_id: req.hostel_id,
            room_number: req.room_number,
            phone: req.phone,
        };

        db.with_tx(|conn| -> Result<User, ApiError> {
            if email_taken(conn, &new_user.email)? {
                return Err(ApiError::Conflict(format!("email {} is already registered", new_user.email)));
            }
            if let Some(hostel_id) = new_user.hostel_id {
                if hostel_by_id(conn, hostel_id)?.is_none() {
                    return Err(ApiError::BadRequest(format!("unknown hostel {hostel_id}")));
                }
            }
            Ok(insert_user(conn, &new_user, Utc::now())?)
        })
    })
    .await?;

    info!("Student {} registered ({})", user.id, user.email);
    let token = create_token(&state, user.id, user.role)?;
    Ok((StatusCode::CREATED, Json(auth_response(user, token))))
}

/// Staff sign-up: the account is only created if the enrollment code
/// redeems in the same transaction.
pub async fn register_staff(
    State(state): State<AppState>,
    Json(req): Json<StaffRegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let name = validate_name(&req.name)?;
    validate_password(&req.password)?;
    let code = normalize_staff_code(&req.code);
    if code.is_empty() {
        return Err(ApiError::BadRequest("enrollment code is required".into()));
    }

    let lifecycle = state.lifecycle.clone();
    let (user, _profile) = blocking(move || {
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: hash_password(&req.password)?,
            name,
            role: Role::Staff,
            hostel_id: None,
            room_number: None,
            phone: req.phone,
        };
        Ok(lifecycle.enroll_staff(&code, new_user)?)
    })
    .await?;

    let token = create_token(&state, user.id, user.role)?;
    Ok((StatusCode::CREATED, Json(auth_response(user, token))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let email = req.email.trim().to_lowercase();
    let user = blocking(move || {
        let row = db
            .get_user_by_email(&email)?
            .ok_or(ApiError::BadCredentials)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is malformed: {}", row.user.id, e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::BadCredentials)?;

        Ok(row.user)
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::BadCredentials) {
            warn!("Failed login for {}", req.email.trim());
        }
    })?;

    let token = create_token(&state, user.id, user.role)?;
    Ok(Json(auth_response(user, token)))
}

pub fn create_token(state: &AppStateInner, user_id: Uuid, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: (Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Hash password with Argon2id.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn auth_response(user: User, token: String) -> AuthResponse {
    AuthResponse {
        user_id: user.id,
        role: user.role,
        name: user.name,
        token,
    }
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && email.len() <= 254 => Ok(email),
        _ => Err(ApiError::BadRequest("a valid email address is required".into())),
    }
}

pub(crate) fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::BadRequest("name must be 1-100 characters".into()));
    }
    Ok(name.to_string())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Meera@Hostel.EDU ").unwrap(), "meera@hostel.edu");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@hostel.edu").is_err());
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong horse", &parsed).is_err());
    }
}
