use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE hostels (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                address     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                name        TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('STUDENT', 'STAFF', 'ADMIN')),
                hostel_id   TEXT REFERENCES hostels(id) ON DELETE SET NULL,
                room_number TEXT,
                phone       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE staff_codes (
                id          TEXT PRIMARY KEY,
                code        TEXT NOT NULL UNIQUE,
                status      TEXT NOT NULL DEFAULT 'AVAILABLE'
                            CHECK (status IN ('AVAILABLE', 'DISABLED')),
                claimed     INTEGER NOT NULL DEFAULT 0,
                claimed_by  TEXT REFERENCES users(id),
                claimed_at  TEXT,
                created_at  TEXT NOT NULL,
                CHECK (claimed = 0 OR claimed_by IS NOT NULL)
            );

            CREATE TABLE staff_profiles (
                user_id     TEXT PRIMARY KEY REFERENCES users(id),
                staff_code  TEXT NOT NULL UNIQUE REFERENCES staff_codes(code),
                created_at  TEXT NOT NULL
            );

            CREATE TABLE orders (
                id          TEXT PRIMARY KEY,
                code        TEXT NOT NULL UNIQUE,
                student_id  TEXT NOT NULL REFERENCES users(id),
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_orders_student ON orders(student_id, created_at);
            CREATE INDEX idx_orders_status ON orders(status, created_at);

            CREATE TABLE order_items (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL REFERENCES orders(id),
                position    INTEGER NOT NULL,
                kind        TEXT NOT NULL,
                quantity    INTEGER NOT NULL CHECK (quantity > 0),
                remark      TEXT
            );

            CREATE INDEX idx_order_items_order ON order_items(order_id, position);

            CREATE TABLE order_item_images (
                id          TEXT PRIMARY KEY,
                item_id     TEXT NOT NULL REFERENCES order_items(id),
                url         TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE qr_tokens (
                order_id    TEXT PRIMARY KEY REFERENCES orders(id),
                payload     TEXT NOT NULL UNIQUE,
                scanned_at  TEXT,
                scanned_by  TEXT REFERENCES users(id)
            );

            CREATE TABLE complaints (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL REFERENCES orders(id),
                student_id  TEXT NOT NULL REFERENCES users(id),
                description TEXT NOT NULL,
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_complaints_order ON complaints(order_id);
            CREATE INDEX idx_complaints_student ON complaints(student_id, created_at);

            CREATE TABLE complaint_images (
                id           TEXT PRIMARY KEY,
                complaint_id TEXT NOT NULL REFERENCES complaints(id),
                url          TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE TABLE order_status_history (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL REFERENCES orders(id),
                from_status TEXT NOT NULL,
                to_status   TEXT NOT NULL,
                actor_id    TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_order_history ON order_status_history(order_id, created_at);

            CREATE TABLE complaint_status_history (
                id           TEXT PRIMARY KEY,
                complaint_id TEXT NOT NULL REFERENCES complaints(id),
                from_status  TEXT NOT NULL,
                to_status    TEXT NOT NULL,
                actor_id     TEXT NOT NULL REFERENCES users(id),
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_complaint_history ON complaint_status_history(complaint_id, created_at);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                kind        TEXT NOT NULL,
                message     TEXT NOT NULL,
                entity_id   TEXT,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            -- History is append-only.
            CREATE TRIGGER order_history_no_update BEFORE UPDATE ON order_status_history
            BEGIN SELECT RAISE(ABORT, 'order_status_history is append-only'); END;
            CREATE TRIGGER order_history_no_delete BEFORE DELETE ON order_status_history
            BEGIN SELECT RAISE(ABORT, 'order_status_history is append-only'); END;
            CREATE TRIGGER complaint_history_no_update BEFORE UPDATE ON complaint_status_history
            BEGIN SELECT RAISE(ABORT, 'complaint_status_history is append-only'); END;
            CREATE TRIGGER complaint_history_no_delete BEFORE DELETE ON complaint_status_history
            BEGIN SELECT RAISE(ABORT, 'complaint_status_history is append-only'); END;

            -- A claimed code stays claimed by the same user.
            CREATE TRIGGER staff_code_claim_permanent BEFORE UPDATE ON staff_codes
            WHEN OLD.claimed = 1
                AND (NEW.claimed = 0 OR NEW.claimed_by IS NOT OLD.claimed_by)
            BEGIN SELECT RAISE(ABORT, 'staff code already claimed'); END;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
