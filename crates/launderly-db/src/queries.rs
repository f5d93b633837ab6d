//! Users, hostels and staff enrollment codes.
//!
//! The free functions take a bare `&Connection` so the lifecycle manager can
//! compose them inside one `Database::with_tx` call; the `Database` methods
//! are the one-shot versions used by the CRUD handlers.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use launderly_types::StaffCodeStatus;
use launderly_types::api::UpdateProfileRequest;
use launderly_types::models::{Hostel, StaffCode, StaffProfile, User};

use crate::Database;
use crate::models::{
    NewUser, UserRow, enum_at, opt_time_at, opt_uuid_at, time_at, ts, uuid_at,
};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.with_conn(|conn| insert_user(conn, user, Utc::now()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_row_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| user_by_id(conn, id))
    }

    pub fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    hostel_id = COALESCE(?3, hostel_id),
                    room_number = COALESCE(?4, room_number),
                    phone = COALESCE(?5, phone)
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.name,
                    update.hostel_id.map(|h| h.to_string()),
                    update.room_number,
                    update.phone,
                ],
            )?;
            user_by_id(conn, id)
        })
    }

    // -- Hostels --

    pub fn create_hostel(&self, name: &str, address: Option<&str>) -> Result<Hostel> {
        self.with_conn(|conn| insert_hostel(conn, name, address, Utc::now()))
    }

    pub fn list_hostels(&self) -> Result<Vec<Hostel>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, address, created_at FROM hostels ORDER BY name")?;
            let rows = stmt
                .query_map([], map_hostel)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_hostel(&self, id: Uuid) -> Result<Option<Hostel>> {
        self.with_conn(|conn| hostel_by_id(conn, id))
    }

    /// Deletes a hostel. Residents keep their accounts with the hostel cleared.
    pub fn delete_hostel(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM hostels WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    // -- Staff codes --

    pub fn create_staff_code(&self, code: &str) -> Result<StaffCode> {
        self.with_conn(|conn| insert_staff_code(conn, code, Utc::now()))
    }

    pub fn list_staff_codes(&self) -> Result<Vec<StaffCode>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STAFF_CODE_COLUMNS} FROM staff_codes ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], map_staff_code)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_staff_code(&self, id: Uuid) -> Result<Option<StaffCode>> {
        self.with_conn(|conn| staff_code_by_id(conn, id))
    }

    /// Flips the administrative status of an unclaimed code. Returns `false`
    /// when the code is claimed (or missing) and nothing changed.
    pub fn set_staff_code_status(&self, id: Uuid, status: StaffCodeStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE staff_codes SET status = ?2 WHERE id = ?1 AND claimed = 0",
                params![id.to_string(), status.as_str()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes an unclaimed code. Claimed codes are permanent.
    pub fn delete_staff_code(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM staff_codes WHERE id = ?1 AND claimed = 0",
                [id.to_string()],
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn get_staff_profile(&self, user_id: Uuid) -> Result<Option<StaffProfile>> {
        self.with_conn(|conn| staff_profile_by_user(conn, user_id))
    }
}

// -- Users --

const USER_COLUMNS: &str =
    "id, email, name, role, hostel_id, room_number, phone, created_at, password";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: enum_at(row, 3)?,
        hostel_id: opt_uuid_at(row, 4)?,
        room_number: row.get(5)?,
        phone: row.get(6)?,
        created_at: time_at(row, 7)?,
    })
}

pub fn insert_user(conn: &Connection, user: &NewUser, now: DateTime<Utc>) -> Result<User> {
    conn.execute(
        "INSERT INTO users (id, email, password, name, role, hostel_id, room_number, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id.to_string(),
            user.email,
            user.password_hash,
            user.name,
            user.role.as_str(),
            user.hostel_id.map(|h| h.to_string()),
            user.room_number,
            user.phone,
            ts(&now),
        ],
    )?;

    Ok(User {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        hostel_id: user.hostel_id,
        room_number: user.room_number.clone(),
        phone: user.phone.clone(),
        created_at: now,
    })
}

pub fn user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id.to_string()],
        map_user,
    )
    .optional()
}

fn user_row_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        [email],
        |row| {
            Ok(UserRow {
                user: map_user(row)?,
                password: row.get(8)?,
            })
        },
    )
    .optional()
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM users WHERE email = ?1", [email], |r| r.get(0))?;
    Ok(count > 0)
}

// -- Hostels --

fn map_hostel(row: &Row<'_>) -> rusqlite::Result<Hostel> {
    Ok(Hostel {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        created_at: time_at(row, 3)?,
    })
}

pub fn hostel_by_id(conn: &Connection, id: Uuid) -> Result<Option<Hostel>> {
    conn.query_row(
        "SELECT id, name, address, created_at FROM hostels WHERE id = ?1",
        [id.to_string()],
        map_hostel,
    )
    .optional()
}

pub fn insert_hostel(
    conn: &Connection,
    name: &str,
    address: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Hostel> {
    let hostel = Hostel {
        id: Uuid::new_v4(),
        name: name.to_string(),
        address: address.map(str::to_string),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO hostels (id, name, address, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![hostel.id.to_string(), hostel.name, hostel.address, ts(&hostel.created_at)],
    )?;
    Ok(hostel)
}

pub fn update_hostel(
    conn: &Connection,
    id: Uuid,
    name: &str,
    address: Option<&str>,
) -> Result<Option<Hostel>> {
    conn.execute(
        "UPDATE hostels SET name = ?2, address = ?3 WHERE id = ?1",
        params![id.to_string(), name, address],
    )?;
    hostel_by_id(conn, id)
}

/// True if another hostel (not `except`) already uses `name`.
pub fn hostel_name_taken(conn: &Connection, name: &str, except: Option<Uuid>) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM hostels WHERE name = ?1 AND id IS NOT ?2",
        params![name, except.map(|id| id.to_string())],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

// -- Staff codes --

const STAFF_CODE_COLUMNS: &str = "id, code, status, claimed, claimed_by, claimed_at, created_at";

fn map_staff_code(row: &Row<'_>) -> rusqlite::Result<StaffCode> {
    Ok(StaffCode {
        id: uuid_at(row, 0)?,
        code: row.get(1)?,
        status: enum_at(row, 2)?,
        claimed: row.get(3)?,
        claimed_by: opt_uuid_at(row, 4)?,
        claimed_at: opt_time_at(row, 5)?,
        created_at: time_at(row, 6)?,
    })
}

pub fn insert_staff_code(conn: &Connection, code: &str, now: DateTime<Utc>) -> Result<StaffCode> {
    let staff_code = StaffCode {
        id: Uuid::new_v4(),
        code: code.to_string(),
        status: StaffCodeStatus::Available,
        claimed: false,
        claimed_by: None,
        claimed_at: None,
        created_at: now,
    };
    conn.execute(
        "INSERT INTO staff_codes (id, code, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            staff_code.id.to_string(),
            staff_code.code,
            staff_code.status.as_str(),
            ts(&staff_code.created_at),
        ],
    )?;
    Ok(staff_code)
}

pub fn staff_code_by_code(conn: &Connection, code: &str) -> Result<Option<StaffCode>> {
    conn.query_row(
        &format!("SELECT {STAFF_CODE_COLUMNS} FROM staff_codes WHERE code = ?1"),
        [code],
        map_staff_code,
    )
    .optional()
}

pub fn staff_code_by_id(conn: &Connection, id: Uuid) -> Result<Option<StaffCode>> {
    conn.query_row(
        &format!("SELECT {STAFF_CODE_COLUMNS} FROM staff_codes WHERE id = ?1"),
        [id.to_string()],
        map_staff_code,
    )
    .optional()
}

/// Compare-and-swap claim: only an unclaimed, AVAILABLE code is updated.
/// Returns the number of rows changed (0 or 1).
pub fn claim_staff_code(
    conn: &Connection,
    id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE staff_codes SET claimed = 1, claimed_by = ?2, claimed_at = ?3
         WHERE id = ?1 AND claimed = 0 AND status = 'AVAILABLE'",
        params![id.to_string(), user_id.to_string(), ts(&now)],
    )?;
    Ok(changed)
}

pub fn insert_staff_profile(
    conn: &Connection,
    user_id: Uuid,
    staff_code: &str,
    now: DateTime<Utc>,
) -> Result<StaffProfile> {
    conn.execute(
        "INSERT INTO staff_profiles (user_id, staff_code, created_at) VALUES (?1, ?2, ?3)",
        params![user_id.to_string(), staff_code, ts(&now)],
    )?;
    Ok(StaffProfile {
        user_id,
        staff_code: staff_code.to_string(),
        created_at: now,
    })
}

pub fn staff_profile_by_user(conn: &Connection, user_id: Uuid) -> Result<Option<StaffProfile>> {
    conn.query_row(
        "SELECT user_id, staff_code, created_at FROM staff_profiles WHERE user_id = ?1",
        [user_id.to_string()],
        |row| {
            Ok(StaffProfile {
                user_id: uuid_at(row, 0)?,
                staff_code: row.get(1)?,
                created_at: time_at(row, 2)?,
            })
        },
    )
    .optional()
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launderly_types::Role;

    fn student(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "hash".into(),
            name: "Asha".into(),
            role: Role::Student,
            hostel_id: None,
            room_number: Some("B-12".into()),
            phone: None,
        }
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_user(&student("asha@campus.edu")).unwrap();

        let row = db.get_user_by_email("ASHA@campus.edu").unwrap().unwrap();
        assert_eq!(row.user.id, created.id);
        assert_eq!(row.password, "hash");
        assert!(db.create_user(&student("Asha@Campus.edu")).is_err());
    }

    #[test]
    fn deleting_hostel_clears_residents() {
        let db = Database::open_in_memory().unwrap();
        let hostel = db.create_hostel("Tagore", Some("North campus")).unwrap();
        let mut new = student("r@campus.edu");
        new.hostel_id = Some(hostel.id);
        let user = db.create_user(&new).unwrap();

        assert!(db.delete_hostel(hostel.id).unwrap());
        assert!(!db.delete_hostel(hostel.id).unwrap());
        assert_eq!(db.get_user_by_id(user.id).unwrap().unwrap().hostel_id, None);
    }

    #[test]
    fn hostel_name_check_skips_self() {
        let db = Database::open_in_memory().unwrap();
        let hostel = db.create_hostel("Tagore", None).unwrap();
        db.with_conn(|conn| {
            assert!(hostel_name_taken(conn, "Tagore", None)?);
            assert!(!hostel_name_taken(conn, "Tagore", Some(hostel.id))?);
            assert!(!hostel_name_taken(conn, "Raman", None)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn profile_update_keeps_unset_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&student("p@campus.edu")).unwrap();
        let updated = db
            .update_profile(
                user.id,
                &UpdateProfileRequest {
                    phone: Some("555-0101".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0101"));
        assert_eq!(updated.room_number.as_deref(), Some("B-12"));
        assert_eq!(updated.name, "Asha");
    }

    #[test]
    fn claimed_codes_are_locked() {
        let db = Database::open_in_memory().unwrap();
        let code = db.create_staff_code("STF-LOCKED01").unwrap();
        let staff = db
            .create_user(&NewUser {
                role: Role::Staff,
                ..student("s@campus.edu")
            })
            .unwrap();

        let claimed = db
            .with_conn(|conn| claim_staff_code(conn, code.id, staff.id, Utc::now()))
            .unwrap();
        assert_eq!(claimed, 1);

        assert!(!db.set_staff_code_status(code.id, StaffCodeStatus::Disabled).unwrap());
        assert!(!db.delete_staff_code(code.id).unwrap());
        let again = db
            .with_conn(|conn| claim_staff_code(conn, code.id, staff.id, Utc::now()))
            .unwrap();
        assert_eq!(again, 0);
    }
}
