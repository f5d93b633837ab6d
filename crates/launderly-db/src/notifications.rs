use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use launderly_types::NotificationKind;
use launderly_types::api::PageQuery;
use launderly_types::models::Notification;

use crate::Database;
use crate::models::{count_at, enum_at, opt_uuid_at, time_at, ts, uuid_at};

impl Database {
    pub fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: &PageQuery,
    ) -> Result<(Vec<Notification>, u64)> {
        self.with_conn(|conn| query_notifications(conn, user_id, unread_only, page))
    }

    /// Marks one of the user's notifications read. Returns `false` when the
    /// notification does not exist or belongs to someone else.
    pub fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2)?,
        message: row.get(3)?,
        entity_id: opt_uuid_at(row, 4)?,
        read: row.get(5)?,
        created_at: time_at(row, 6)?,
    })
}

pub fn insert_notification(
    conn: &Connection,
    user_id: Uuid,
    kind: NotificationKind,
    message: &str,
    entity_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind,
        message: message.to_string(),
        entity_id,
        read: false,
        created_at: now,
    };
    conn.execute(
        "INSERT INTO notifications (id, user_id, kind, message, entity_id, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            notification.id.to_string(),
            user_id.to_string(),
            kind.as_str(),
            message,
            entity_id.map(|id| id.to_string()),
            ts(&now),
        ],
    )?;
    Ok(notification)
}

pub fn notifications_for_user(conn: &Connection, user_id: Uuid) -> Result<Vec<Notification>> {
    let (rows, _) = query_notifications(
        conn,
        user_id,
        false,
        &PageQuery {
            page: Some(1),
            limit: Some(launderly_types::api::MAX_PAGE_LIMIT),
        },
    )?;
    Ok(rows)
}

fn query_notifications(
    conn: &Connection,
    user_id: Uuid,
    unread_only: bool,
    page: &PageQuery,
) -> Result<(Vec<Notification>, u64)> {
    let total = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND (?2 = 0 OR read = 0)",
        params![user_id.to_string(), unread_only],
        |r| count_at(r, 0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, message, entity_id, read, created_at FROM notifications
         WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?3 OFFSET ?4",
    )?;
    let rows = stmt
        .query_map(
            params![user_id.to_string(), unread_only, page.limit(), page.offset()],
            map_notification,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewUser;
    use launderly_types::Role;

    #[test]
    fn read_flags_are_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email: "n@campus.edu".into(),
                password_hash: "h".into(),
                name: "N".into(),
                role: Role::Student,
                hostel_id: None,
                room_number: None,
                phone: None,
            })
            .unwrap();

        let first = db
            .with_conn(|conn| {
                insert_notification(conn, user.id, NotificationKind::OrderPending, "one", None, Utc::now())
            })
            .unwrap();
        db.with_conn(|conn| {
            insert_notification(conn, user.id, NotificationKind::OrderPending, "two", None, Utc::now())
        })
        .unwrap();

        assert!(!db.mark_notification_read(first.id, Uuid::new_v4()).unwrap());
        assert!(db.mark_notification_read(first.id, user.id).unwrap());

        let page = PageQuery::default();
        let (unread, total) = db.list_notifications(user.id, true, &page).unwrap();
        assert_eq!(total, 1);
        assert_eq!(unread[0].message, "two");

        assert_eq!(db.mark_all_notifications_read(user.id).unwrap(), 1);
        let (_, total) = db.list_notifications(user.id, true, &page).unwrap();
        assert_eq!(total, 0);
    }
}
