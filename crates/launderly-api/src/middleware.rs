use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use launderly_types::Role;
use launderly_types::api::Claims;
use launderly_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header. The decoded
/// caller is stored in request extensions as an [`Actor`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let claims = token_data.claims;
    req.extensions_mut().insert(Actor::new(claims.sub, claims.role));
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let actor = req
        .extensions()
        .get::<Actor>()
        .copied()
        .ok_or(ApiError::Unauthorized)?;

    if actor.role != Role::Admin {
        return Err(ApiError::Forbidden("admin access required".into()));
    }
    Ok(next.run(req).await)
}
