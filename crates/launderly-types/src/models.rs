use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{ComplaintStatus, NotificationKind, OrderStatus, StaffCodeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

text_enum!(Role {
    Student => "STUDENT",
    Staff => "STAFF",
    Admin => "ADMIN",
});

/// The authenticated caller of an operation. Passed explicitly into every
/// lifecycle call instead of being looked up from ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_staff_or_admin(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub hostel_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hostel {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub code: String,
    pub student_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub kind: String,
    pub quantity: u32,
    pub remark: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// QR token attached one-to-one to an order. The payload is an opaque,
/// unsigned string matched by equality only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrToken {
    pub order_id: Uuid,
    pub payload: String,
    pub scanned_at: Option<DateTime<Utc>>,
    pub scanned_by: Option<Uuid>,
}

impl QrToken {
    pub fn payload_for(code: &str, order_id: Uuid) -> String {
        format!("{code}:{order_id}")
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: Uuid,
    pub order_id: Uuid,
    pub student_id: Uuid,
    pub description: String,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of an append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub from_status: S,
    pub to_status: S,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCode {
    pub id: Uuid,
    pub code: String,
    pub status: StaffCodeStatus,
    pub claimed: bool,
    pub claimed_by: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StaffCode {
    pub fn is_redeemable(&self) -> bool {
        self.status == StaffCodeStatus::Available && !self.claimed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProfile {
    pub user_id: Uuid,
    pub staff_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub entity_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
