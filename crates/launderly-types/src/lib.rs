#[macro_use]
mod text_enum;

pub mod api;
pub mod models;
pub mod status;

pub use models::Role;
pub use status::{ComplaintStatus, NotificationKind, OrderStatus, StaffCodeStatus, normalize_staff_code};
pub use text_enum::UnknownVariant;
