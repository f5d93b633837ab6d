use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use launderly_db::queries::{
    claim_staff_code, email_taken, insert_staff_profile, insert_user, staff_code_by_code,
    staff_profile_by_user, user_by_id,
};
use launderly_db::{Connection, NewUser};
use launderly_types::{Role, normalize_staff_code};
use launderly_types::models::{StaffProfile, User};

use crate::{LifecycleError, LifecycleManager, Result};

impl LifecycleManager {
    /// Binds an existing staff account to an enrollment code. The code must
    /// be AVAILABLE and unclaimed; a second redemption fails with
    /// `InvalidState`.
    pub fn redeem_staff_code(&self, code: &str, user_id: Uuid) -> Result<StaffProfile> {
        let now = Utc::now();
        self.db
            .with_tx(|conn| -> Result<StaffProfile> {
                let user = user_by_id(conn, user_id)?
                    .ok_or_else(|| LifecycleError::not_found("user", user_id))?;
                redeem(conn, code, &user, now)
            })
            .inspect(|profile| info!("Staff code {} claimed by {}", profile.staff_code, user_id))
            .inspect_err(|e| warn!("Staff code redemption by {} rejected: {}", user_id, e))
    }

    /// Creates a staff account and redeems `code` for it in one
    /// transaction, so a rejected code leaves no account behind.
    pub fn enroll_staff(&self, code: &str, new_user: NewUser) -> Result<(User, StaffProfile)> {
        if new_user.role != Role::Staff {
            return Err(LifecycleError::Validation("enrollment codes create staff accounts".into()));
        }

        let now = Utc::now();
        self.db
            .with_tx(|conn| -> Result<(User, StaffProfile)> {
                if email_taken(conn, &new_user.email)? {
                    return Err(LifecycleError::InvalidState(format!(
                        "email {} is already registered",
                        new_user.email
                    )));
                }
                let user = insert_user(conn, &new_user, now)?;
                let profile = redeem(conn, code, &user, now)?;
                Ok((user, profile))
            })
            .inspect(|(user, _)| info!("Staff account {} enrolled with code {}", user.id, code))
            .inspect_err(|e| warn!("Staff enrollment rejected: {}", e))
    }
}

fn redeem(conn: &Connection, code: &str, user: &User, now: DateTime<Utc>) -> Result<StaffProfile> {
    if user.role != Role::Staff {
        return Err(LifecycleError::Forbidden(
            "only staff accounts can redeem enrollment codes".into(),
        ));
    }
    if staff_profile_by_user(conn, user.id)?.is_some() {
        return Err(LifecycleError::InvalidState(format!(
            "user {} already has a staff profile",
            user.id
        )));
    }

    let code = normalize_staff_code(code);
    let staff_code =
        staff_code_by_code(conn, &code)?.ok_or_else(|| LifecycleError::not_found("staff code", &code))?;

    if staff_code.claimed {
        return Err(LifecycleError::InvalidState(format!(
            "staff code {} has already been claimed",
            staff_code.code
        )));
    }
    if !staff_code.is_redeemable() {
        return Err(LifecycleError::InvalidState(format!(
            "staff code {} is {}",
            staff_code.code,
            staff_code.status.as_str().to_lowercase()
        )));
    }

    let profile = insert_staff_profile(conn, user.id, &staff_code.code, now)?;
    if claim_staff_code(conn, staff_code.id, user.id, now)? == 0 {
        return Err(LifecycleError::conflict("staff code", &staff_code.code));
    }
    Ok(profile)
}
