use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use tracing::warn;

use launderly_types::api::{Dashboard, HostelOrderCount};
use launderly_types::{ComplaintStatus, OrderStatus, Role};

use crate::Database;
use crate::models::{count_at, opt_uuid_at};

impl Database {
    /// Aggregate counts for the admin dashboard. Every known status appears
    /// in the maps, with zero when nothing is in that state.
    pub fn dashboard(&self) -> Result<Dashboard> {
        self.with_conn(|conn| {
            let users_by_role = grouped(conn, "SELECT role, COUNT(*) FROM users GROUP BY role", Role::ALL)?;
            let orders_by_status = grouped(
                conn,
                "SELECT status, COUNT(*) FROM orders GROUP BY status",
                OrderStatus::ALL,
            )?;
            let complaints_by_status = grouped(
                conn,
                "SELECT status, COUNT(*) FROM complaints GROUP BY status",
                ComplaintStatus::ALL,
            )?;

            let mut stmt = conn.prepare(
                "SELECT h.id, COALESCE(h.name, 'Unassigned'), COUNT(o.id)
                 FROM orders o
                 JOIN users u ON o.student_id = u.id
                 LEFT JOIN hostels h ON u.hostel_id = h.id
                 GROUP BY h.id
                 ORDER BY COUNT(o.id) DESC, h.name",
            )?;
            let orders_per_hostel = stmt
                .query_map([], |row| {
                    Ok(HostelOrderCount {
                        hostel_id: opt_uuid_at(row, 0)?,
                        hostel_name: row.get(1)?,
                        orders: count_at(row, 2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let total_orders: u64 = orders_by_status.values().sum();
            let open_complaints: u64 = complaints_by_status
                .iter()
                .filter(|(status, _)| **status != ComplaintStatus::Closed)
                .map(|(_, count)| count)
                .sum();

            Ok(Dashboard {
                users_by_role,
                orders_by_status,
                complaints_by_status,
                orders_per_hostel,
                total_orders,
                open_complaints,
                generated_at: Utc::now(),
            })
        })
    }
}

fn grouped<K>(conn: &Connection, sql: &str, all: &[K]) -> Result<BTreeMap<K, u64>>
where
    K: FromStr + Ord + Copy,
{
    let mut counts: BTreeMap<K, u64> = all.iter().map(|k| (*k, 0)).collect();

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, count_at(row, 1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (raw, count) in rows {
        match raw.parse::<K>() {
            Ok(key) => {
                counts.insert(key, count);
            }
            Err(_) => warn!("Skipping unknown value '{}' in dashboard aggregate", raw),
        }
    }
    Ok(counts)
}
