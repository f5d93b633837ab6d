use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Complaint, Order, OrderItem, QrToken, Role, StaffCode, User};
use crate::status::{ComplaintStatus, OrderStatus, StaffCodeStatus};

// -- JWT Claims --

/// Bearer token claims. The role travels with the token so handlers can
/// build an `Actor` without a user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub hostel_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaffRegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub code: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub hostel_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub phone: Option<String>,
}

// -- Pagination --

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &PageQuery, total: u64) -> Self {
        Self {
            items,
            page: query.page(),
            limit: query.limit(),
            total,
        }
    }
}

/// Query strings cannot use `#[serde(flatten)]` with numeric fields, so
/// list queries repeat `page`/`limit` and convert through this.
macro_rules! paged_query {
    ($($name:ident),+) => {
        $(impl $name {
            pub fn paging(&self) -> PageQuery {
                PageQuery {
                    page: self.page,
                    limit: self.limit,
                }
            }
        })+
    };
}

paged_query!(OrderListQuery, ComplaintListQuery, NotificationQuery);

// -- Orders --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOrderItem {
    pub kind: String,
    pub quantity: u32,
    pub remark: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub qr: QrToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub student_name: String,
    pub item_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachImageRequest {
    pub url: String,
}

// -- Complaints --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateComplaintRequest {
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintListQuery {
    pub status: Option<ComplaintStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `?from=OPEN` on advance: apply only if the complaint is still there.
#[derive(Debug, Deserialize)]
pub struct AdvanceQuery {
    pub from: Option<ComplaintStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComplaintDetail {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub image_urls: Vec<String>,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostelRequest {
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStaffCodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStaffCodeRequest {
    pub status: StaffCodeStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StaffCodeList {
    pub codes: Vec<StaffCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostelOrderCount {
    pub hostel_id: Option<Uuid>,
    pub hostel_name: String,
    pub orders: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Dashboard {
    pub users_by_role: BTreeMap<Role, u64>,
    pub orders_by_status: BTreeMap<OrderStatus, u64>,
    pub complaints_by_status: BTreeMap<ComplaintStatus, u64>,
    pub orders_per_hostel: Vec<HostelOrderCount>,
    pub total_orders: u64,
    pub open_complaints: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub staff_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_clamps() {
        let q = PageQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, DEFAULT_PAGE_LIMIT, 0));

        let q = PageQuery { page: Some(3), limit: Some(500) };
        assert_eq!(q.limit(), MAX_PAGE_LIMIT);
        assert_eq!(q.offset(), 200);

        let q = PageQuery { page: Some(0), limit: Some(0) };
        assert_eq!((q.page(), q.limit()), (1, 1));
    }

    #[test]
    fn register_rejects_unknown_fields() {
        let body = r#"{"email":"a@b.c","password":"hunter22","name":"A","role":"ADMIN"}"#;
        assert!(serde_json::from_str::<RegisterRequest>(body).is_err());
    }

    #[test]
    fn dashboard_keys_use_wire_names() {
        let mut orders_by_status = BTreeMap::new();
        orders_by_status.insert(OrderStatus::QrNotScanned, 2);
        let dashboard = Dashboard {
            users_by_role: BTreeMap::new(),
            orders_by_status,
            complaints_by_status: BTreeMap::new(),
            orders_per_hostel: vec![],
            total_orders: 2,
            open_complaints: 0,
            generated_at: Utc::now(),
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["orders_by_status"]["QR_NOT_SCANNED"], 2);
    }
}
