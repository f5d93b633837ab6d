//! Orders, QR tokens, complaints and their status histories.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use launderly_types::api::{OrderDetail, OrderSummary, PageQuery};
use launderly_types::models::{Complaint, Order, OrderItem, QrToken, StatusChange};
use launderly_types::{ComplaintStatus, OrderStatus};

use crate::Database;
use crate::models::{count_at, enum_at, opt_time_at, opt_uuid_at, time_at, ts, uuid_at};
use crate::queries::OptionalExt;

/// Filter for order and complaint listings.
#[derive(Debug, Clone, Copy)]
pub struct ListFilter<S> {
    /// Restrict to one student's records.
    pub student_id: Option<Uuid>,
    pub status: Option<S>,
}

impl Database {
    pub fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        self.with_conn(|conn| order_by_id(conn, id))
    }

    pub fn get_order_detail(&self, id: Uuid) -> Result<Option<OrderDetail>> {
        self.with_conn(|conn| {
            let Some(order) = order_by_id(conn, id)? else {
                return Ok(None);
            };
            let items = items_for_order(conn, id)?;
            let qr = qr_for_order(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Order {} has no QR token", id))?;
            Ok(Some(OrderDetail { order, items, qr }))
        })
    }

    pub fn list_orders(
        &self,
        filter: ListFilter<OrderStatus>,
        page: &PageQuery,
    ) -> Result<(Vec<OrderSummary>, u64)> {
        self.with_conn(|conn| query_orders(conn, filter, page))
    }

    pub fn order_history(&self, order_id: Uuid) -> Result<Vec<StatusChange<OrderStatus>>> {
        self.with_conn(|conn| order_history(conn, order_id))
    }

    pub fn get_complaint(&self, id: Uuid) -> Result<Option<Complaint>> {
        self.with_conn(|conn| complaint_by_id(conn, id))
    }

    pub fn complaint_images(&self, complaint_id: Uuid) -> Result<Vec<String>> {
        self.with_conn(|conn| complaint_images(conn, complaint_id))
    }

    pub fn list_complaints(
        &self,
        filter: ListFilter<ComplaintStatus>,
        page: &PageQuery,
    ) -> Result<(Vec<Complaint>, u64)> {
        self.with_conn(|conn| query_complaints(conn, filter, page))
    }

    pub fn complaint_history(&self, complaint_id: Uuid) -> Result<Vec<StatusChange<ComplaintStatus>>> {
        self.with_conn(|conn| complaint_history(conn, complaint_id))
    }
}

// -- Orders --

const ORDER_COLUMNS: &str = "id, code, student_id, status, created_at, updated_at";

fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: uuid_at(row, 0)?,
        code: row.get(1)?,
        student_id: uuid_at(row, 2)?,
        status: enum_at(row, 3)?,
        created_at: time_at(row, 4)?,
        updated_at: time_at(row, 5)?,
    })
}

pub fn insert_order(conn: &Connection, order: &Order) -> Result<()> {
    conn.execute(
        "INSERT INTO orders (id, code, student_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            order.id.to_string(),
            order.code,
            order.student_id.to_string(),
            order.status.as_str(),
            ts(&order.created_at),
            ts(&order.updated_at),
        ],
    )?;
    Ok(())
}

pub fn order_by_id(conn: &Connection, id: Uuid) -> Result<Option<Order>> {
    conn.query_row(
        &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
        [id.to_string()],
        map_order,
    )
    .optional()
}

/// Compare-and-swap on the status column. Returns 0 when another writer
/// moved the order first.
pub fn update_order_status(
    conn: &Connection,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), from.as_str(), to.as_str(), ts(&now)],
    )?;
    Ok(changed)
}

fn query_orders(
    conn: &Connection,
    filter: ListFilter<OrderStatus>,
    page: &PageQuery,
) -> Result<(Vec<OrderSummary>, u64)> {
    let student = filter.student_id.map(|id| id.to_string());
    let status = filter.status.map(|s| s.as_str());

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders
         WHERE (?1 IS NULL OR student_id = ?1) AND (?2 IS NULL OR status = ?2)",
        params![student, status],
        |r| r.get(0),
    )?;

    // JOIN users and aggregate items in one query (no N+1)
    let mut stmt = conn.prepare(
        "SELECT o.id, o.code, o.student_id, o.status, o.created_at, o.updated_at,
                COALESCE(u.name, 'unknown'),
                (SELECT COALESCE(SUM(quantity), 0) FROM order_items i WHERE i.order_id = o.id)
         FROM orders o
         LEFT JOIN users u ON o.student_id = u.id
         WHERE (?1 IS NULL OR o.student_id = ?1) AND (?2 IS NULL OR o.status = ?2)
         ORDER BY o.created_at DESC
         LIMIT ?3 OFFSET ?4",
    )?;

    let rows = stmt
        .query_map(params![student, status, page.limit(), page.offset()], |row| {
            Ok(OrderSummary {
                order: map_order(row)?,
                student_name: row.get(6)?,
                item_count: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total.max(0) as u64))
}

// -- Items --

fn map_item(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: uuid_at(row, 0)?,
        order_id: uuid_at(row, 1)?,
        kind: row.get(2)?,
        quantity: row.get(3)?,
        remark: row.get(4)?,
        image_urls: Vec::new(),
    })
}

pub fn insert_order_item(conn: &Connection, item: &OrderItem, position: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO order_items (id, order_id, position, kind, quantity, remark)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.id.to_string(),
            item.order_id.to_string(),
            position as i64,
            item.kind,
            item.quantity,
            item.remark,
        ],
    )?;
    Ok(())
}

pub fn insert_item_image(conn: &Connection, item_id: Uuid, url: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO order_item_images (id, item_id, url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![Uuid::new_v4().to_string(), item_id.to_string(), url, ts(&now)],
    )?;
    Ok(())
}

fn item_images(conn: &Connection, item_id: Uuid) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT url FROM order_item_images WHERE item_id = ?1 ORDER BY created_at, rowid",
    )?;
    let urls = stmt
        .query_map([item_id.to_string()], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(urls)
}

pub fn items_for_order(conn: &Connection, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, kind, quantity, remark FROM order_items
         WHERE order_id = ?1 ORDER BY position",
    )?;
    let mut items = stmt
        .query_map([order_id.to_string()], map_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for item in &mut items {
        item.image_urls = item_images(conn, item.id)?;
    }
    Ok(items)
}

// -- QR tokens --

fn map_qr(row: &Row<'_>) -> rusqlite::Result<QrToken> {
    Ok(QrToken {
        order_id: uuid_at(row, 0)?,
        payload: row.get(1)?,
        scanned_at: opt_time_at(row, 2)?,
        scanned_by: opt_uuid_at(row, 3)?,
    })
}

pub fn insert_qr_token(conn: &Connection, token: &QrToken) -> Result<()> {
    conn.execute(
        "INSERT INTO qr_tokens (order_id, payload) VALUES (?1, ?2)",
        params![token.order_id.to_string(), token.payload],
    )?;
    Ok(())
}

pub fn qr_for_order(conn: &Connection, order_id: Uuid) -> Result<Option<QrToken>> {
    conn.query_row(
        "SELECT order_id, payload, scanned_at, scanned_by FROM qr_tokens WHERE order_id = ?1",
        [order_id.to_string()],
        map_qr,
    )
    .optional()
}

pub fn qr_by_payload(conn: &Connection, payload: &str) -> Result<Option<QrToken>> {
    conn.query_row(
        "SELECT order_id, payload, scanned_at, scanned_by FROM qr_tokens WHERE payload = ?1",
        [payload],
        map_qr,
    )
    .optional()
}

/// Marks a token scanned only if it has not been scanned yet.
pub fn mark_qr_scanned(
    conn: &Connection,
    order_id: Uuid,
    staff_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE qr_tokens SET scanned_at = ?2, scanned_by = ?3
         WHERE order_id = ?1 AND scanned_at IS NULL",
        params![order_id.to_string(), ts(&now), staff_id.to_string()],
    )?;
    Ok(changed)
}

// -- Complaints --

const COMPLAINT_COLUMNS: &str =
    "id, order_id, student_id, description, status, created_at, updated_at";

fn map_complaint(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    Ok(Complaint {
        id: uuid_at(row, 0)?,
        order_id: uuid_at(row, 1)?,
        student_id: uuid_at(row, 2)?,
        description: row.get(3)?,
        status: enum_at(row, 4)?,
        created_at: time_at(row, 5)?,
        updated_at: time_at(row, 6)?,
    })
}

pub fn insert_complaint(conn: &Connection, complaint: &Complaint) -> Result<()> {
    conn.execute(
        "INSERT INTO complaints (id, order_id, student_id, description, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            complaint.id.to_string(),
            complaint.order_id.to_string(),
            complaint.student_id.to_string(),
            complaint.description,
            complaint.status.as_str(),
            ts(&complaint.created_at),
            ts(&complaint.updated_at),
        ],
    )?;
    Ok(())
}

pub fn complaint_by_id(conn: &Connection, id: Uuid) -> Result<Option<Complaint>> {
    conn.query_row(
        &format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?1"),
        [id.to_string()],
        map_complaint,
    )
    .optional()
}

pub fn update_complaint_status(
    conn: &Connection,
    id: Uuid,
    from: ComplaintStatus,
    to: ComplaintStatus,
    now: DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE complaints SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), from.as_str(), to.as_str(), ts(&now)],
    )?;
    Ok(changed)
}

pub fn insert_complaint_image(
    conn: &Connection,
    complaint_id: Uuid,
    url: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO complaint_images (id, complaint_id, url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![Uuid::new_v4().to_string(), complaint_id.to_string(), url, ts(&now)],
    )?;
    Ok(())
}

pub fn complaint_images(conn: &Connection, complaint_id: Uuid) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT url FROM complaint_images WHERE complaint_id = ?1 ORDER BY created_at, rowid",
    )?;
    let urls = stmt
        .query_map([complaint_id.to_string()], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(urls)
}

fn query_complaints(
    conn: &Connection,
    filter: ListFilter<ComplaintStatus>,
    page: &PageQuery,
) -> Result<(Vec<Complaint>, u64)> {
    let student = filter.student_id.map(|id| id.to_string());
    let status = filter.status.map(|s| s.as_str());

    let total = conn.query_row(
        "SELECT COUNT(*) FROM complaints
         WHERE (?1 IS NULL OR student_id = ?1) AND (?2 IS NULL OR status = ?2)",
        params![student, status],
        |r| count_at(r, 0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPLAINT_COLUMNS} FROM complaints
         WHERE (?1 IS NULL OR student_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt
        .query_map(params![student, status, page.limit(), page.offset()], map_complaint)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

// -- Status history --

#[derive(Clone, Copy)]
enum HistoryTable {
    Order,
    Complaint,
}

impl HistoryTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Order => "order_status_history",
            Self::Complaint => "complaint_status_history",
        }
    }

    const fn entity_column(self) -> &'static str {
        match self {
            Self::Order => "order_id",
            Self::Complaint => "complaint_id",
        }
    }
}

fn insert_history(
    conn: &Connection,
    table: HistoryTable,
    entity_id: Uuid,
    from: &str,
    to: &str,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        &format!(
            "INSERT INTO {} (id, {}, from_status, to_status, actor_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            table.table(),
            table.entity_column()
        ),
        params![id.to_string(), entity_id.to_string(), from, to, actor_id.to_string(), ts(&now)],
    )?;
    Ok(id)
}

fn history<S>(conn: &Connection, table: HistoryTable, entity_id: Uuid) -> Result<Vec<StatusChange<S>>>
where
    S: std::str::FromStr,
    S::Err: std::error::Error + Send + Sync + 'static,
{
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {col}, from_status, to_status, actor_id, created_at FROM {table}
         WHERE {col} = ?1 ORDER BY created_at, rowid",
        col = table.entity_column(),
        table = table.table(),
    ))?;
    let rows = stmt
        .query_map([entity_id.to_string()], |row| {
            Ok(StatusChange {
                id: uuid_at(row, 0)?,
                entity_id: uuid_at(row, 1)?,
                from_status: enum_at(row, 2)?,
                to_status: enum_at(row, 3)?,
                actor_id: uuid_at(row, 4)?,
                created_at: time_at(row, 5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_order_history(
    conn: &Connection,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Uuid> {
    insert_history(conn, HistoryTable::Order, order_id, from.as_str(), to.as_str(), actor_id, now)
}

pub fn order_history(conn: &Connection, order_id: Uuid) -> Result<Vec<StatusChange<OrderStatus>>> {
    history(conn, HistoryTable::Order, order_id)
}

pub fn insert_complaint_history(
    conn: &Connection,
    complaint_id: Uuid,
    from: ComplaintStatus,
    to: ComplaintStatus,
    actor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Uuid> {
    insert_history(
        conn,
        HistoryTable::Complaint,
        complaint_id,
        from.as_str(),
        to.as_str(),
        actor_id,
        now,
    )
}

pub fn complaint_history(
    conn: &Connection,
    complaint_id: Uuid,
) -> Result<Vec<StatusChange<ComplaintStatus>>> {
    history(conn, HistoryTable::Complaint, complaint_id)
}
