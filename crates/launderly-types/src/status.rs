//! Lifecycle states and their transition tables.
//!
//! Every legal move is one row in [`ORDER_RULES`] or [`COMPLAINT_RULES`].
//! Anything not listed is rejected, so adding a state means adding rows
//! here; the event metadata (`actor`, `owner_only`, notification) is an
//! exhaustive `match` and will not compile until the new event is covered.

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// One legal edge of a state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule<S, E> {
    pub from: S,
    pub event: E,
    pub to: S,
}

fn lookup<S: Copy + Eq, E: Copy + Eq>(rules: &[Rule<S, E>], from: S, event: E) -> Option<S> {
    rules
        .iter()
        .find(|rule| rule.from == from && rule.event == event)
        .map(|rule| rule.to)
}

// -- Orders --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    QrNotScanned,
    InProgress,
    Pending,
    Completed,
}

text_enum!(OrderStatus {
    QrNotScanned => "QR_NOT_SCANNED",
    InProgress => "IN_PROGRESS",
    Pending => "PENDING",
    Completed => "COMPLETED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEvent {
    Scan,
    MarkPending,
    Complete,
}

pub const ORDER_RULES: &[Rule<OrderStatus, OrderEvent>] = &[
    Rule {
        from: OrderStatus::QrNotScanned,
        event: OrderEvent::Scan,
        to: OrderStatus::InProgress,
    },
    Rule {
        from: OrderStatus::InProgress,
        event: OrderEvent::MarkPending,
        to: OrderStatus::Pending,
    },
    Rule {
        from: OrderStatus::Pending,
        event: OrderEvent::Complete,
        to: OrderStatus::Completed,
    },
];

impl OrderStatus {
    /// Target state for `event`, or `None` when the edge does not exist.
    pub fn apply(self, event: OrderEvent) -> Option<Self> {
        lookup(ORDER_RULES, self, event)
    }

    pub fn is_terminal(self) -> bool {
        OrderEvent::ALL.iter().all(|event| self.apply(*event).is_none())
    }
}

impl OrderEvent {
    pub const ALL: &'static [OrderEvent] = &[Self::Scan, Self::MarkPending, Self::Complete];

    pub const fn actor(self) -> Role {
        match self {
            Self::Scan | Self::MarkPending => Role::Staff,
            Self::Complete => Role::Student,
        }
    }

    /// Whether only the student who placed the order may fire this event.
    pub const fn owner_only(self) -> bool {
        match self {
            Self::Scan | Self::MarkPending => false,
            Self::Complete => true,
        }
    }

    pub const fn notification(self) -> Option<NotificationKind> {
        match self {
            Self::MarkPending => Some(NotificationKind::OrderPending),
            Self::Scan | Self::Complete => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::MarkPending => "mark_pending",
            Self::Complete => "complete",
        }
    }
}

// -- Complaints --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    Open,
    InReview,
    Resolved,
    Closed,
}

text_enum!(ComplaintStatus {
    Open => "OPEN",
    InReview => "IN_REVIEW",
    Resolved => "RESOLVED",
    Closed => "CLOSED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplaintEvent {
    Advance,
    Close,
}

pub const COMPLAINT_RULES: &[Rule<ComplaintStatus, ComplaintEvent>] = &[
    Rule {
        from: ComplaintStatus::Open,
        event: ComplaintEvent::Advance,
        to: ComplaintStatus::InReview,
    },
    Rule {
        from: ComplaintStatus::InReview,
        event: ComplaintEvent::Advance,
        to: ComplaintStatus::Resolved,
    },
    Rule {
        from: ComplaintStatus::Resolved,
        event: ComplaintEvent::Close,
        to: ComplaintStatus::Closed,
    },
];

impl ComplaintStatus {
    pub fn apply(self, event: ComplaintEvent) -> Option<Self> {
        lookup(COMPLAINT_RULES, self, event)
    }

    /// Evidence may be attached until the student closes the complaint.
    pub fn accepts_evidence(self) -> bool {
        self != Self::Closed
    }
}

impl ComplaintEvent {
    pub const ALL: &'static [ComplaintEvent] = &[Self::Advance, Self::Close];

    pub const fn actor(self) -> Role {
        match self {
            Self::Advance => Role::Staff,
            Self::Close => Role::Student,
        }
    }

    pub const fn owner_only(self) -> bool {
        match self {
            Self::Advance => false,
            Self::Close => true,
        }
    }

    /// Notification sent to the complaint's student after moving to `to`.
    pub const fn notification(self, to: ComplaintStatus) -> Option<NotificationKind> {
        match (self, to) {
            (Self::Advance, ComplaintStatus::InReview) => Some(NotificationKind::ComplaintInReview),
            (Self::Advance, ComplaintStatus::Resolved) => Some(NotificationKind::ComplaintResolved),
            (Self::Advance, _) | (Self::Close, _) => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Close => "close",
        }
    }
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderPending,
    ComplaintInReview,
    ComplaintResolved,
}

text_enum!(NotificationKind {
    OrderPending => "ORDER_PENDING",
    ComplaintInReview => "COMPLAINT_IN_REVIEW",
    ComplaintResolved => "COMPLAINT_RESOLVED",
});

impl NotificationKind {
    pub fn message(self, reference: &str) -> String {
        match self {
            Self::OrderPending => format!("Your laundry order {reference} is ready for pickup."),
            Self::ComplaintInReview => format!("Your complaint on order {reference} is being reviewed."),
            Self::ComplaintResolved => {
                format!("Your complaint on order {reference} has been resolved. Close it if you are satisfied.")
            }
        }
    }
}

// -- Staff enrollment codes --

/// Administrative switch on an enrollment code. Independent of whether the
/// code has been claimed: a claimed code stays claimed forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffCodeStatus {
    Available,
    Disabled,
}

text_enum!(StaffCodeStatus {
    Available => "AVAILABLE",
    Disabled => "DISABLED",
});

/// Canonical form of an enrollment code: trimmed and upper-cased, so a code
/// typed in any case matches the stored one.
pub fn normalize_staff_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_codes_normalize_case_and_whitespace() {
        assert_eq!(normalize_staff_code("  stf-front-desk\n"), "STF-FRONT-DESK");
        assert_eq!(normalize_staff_code("STF-AB12CD34"), "STF-AB12CD34");
    }

    #[test]
    fn order_path_is_linear() {
        let mut status = OrderStatus::QrNotScanned;
        for event in [OrderEvent::Scan, OrderEvent::MarkPending, OrderEvent::Complete] {
            status = status.apply(event).unwrap();
        }
        assert_eq!(status, OrderStatus::Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn only_listed_order_edges_exist() {
        let mut legal = 0;
        for from in OrderStatus::ALL {
            for event in OrderEvent::ALL {
                if let Some(to) = from.apply(*event) {
                    legal += 1;
                    // never backwards
                    assert!(to > *from, "{from} -> {to}");
                }
            }
        }
        assert_eq!(legal, ORDER_RULES.len());
        assert_eq!(OrderStatus::Pending.apply(OrderEvent::Scan), None);
        assert_eq!(OrderStatus::Pending.apply(OrderEvent::MarkPending), None);
        assert_eq!(OrderStatus::InProgress.apply(OrderEvent::Complete), None);
    }

    #[test]
    fn complaint_edges() {
        assert_eq!(
            ComplaintStatus::Open.apply(ComplaintEvent::Advance),
            Some(ComplaintStatus::InReview)
        );
        assert_eq!(
            ComplaintStatus::InReview.apply(ComplaintEvent::Advance),
            Some(ComplaintStatus::Resolved)
        );
        assert_eq!(ComplaintStatus::Resolved.apply(ComplaintEvent::Advance), None);
        assert_eq!(ComplaintStatus::Open.apply(ComplaintEvent::Close), None);
        assert_eq!(
            ComplaintStatus::Resolved.apply(ComplaintEvent::Close),
            Some(ComplaintStatus::Closed)
        );
        for event in ComplaintEvent::ALL {
            assert_eq!(ComplaintStatus::Closed.apply(*event), None);
        }
    }

    #[test]
    fn complaint_notifications_follow_new_state() {
        assert_eq!(
            ComplaintEvent::Advance.notification(ComplaintStatus::InReview).map(|k| k.as_str()),
            Some("COMPLAINT_IN_REVIEW")
        );
        assert_eq!(
            ComplaintEvent::Advance.notification(ComplaintStatus::Resolved).map(|k| k.as_str()),
            Some("COMPLAINT_RESOLVED")
        );
        assert_eq!(ComplaintEvent::Close.notification(ComplaintStatus::Closed), None);
    }

    #[test]
    fn text_form_matches_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert!("ACTIVE".parse::<StaffCodeStatus>().is_err());
    }
}
