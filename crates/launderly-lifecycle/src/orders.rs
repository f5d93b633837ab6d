use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use launderly_db::{Connection, notifications, orders as store};
use launderly_types::api::{NewOrderItem, OrderDetail};
use launderly_types::models::{Actor, Order, OrderItem, QrToken};
use launderly_types::status::OrderEvent;
use launderly_types::{OrderStatus, Role};

use crate::{LifecycleError, LifecycleManager, Result};

const MAX_ITEMS_PER_ORDER: usize = 50;

impl LifecycleManager {
    /// Creates an order with its items and QR token. The order starts in
    /// QR_NOT_SCANNED and has no history until its first transition.
    pub fn create_order(&self, actor: Actor, items: Vec<NewOrderItem>) -> Result<OrderDetail> {
        if actor.role != Role::Student {
            return Err(LifecycleError::wrong_role(Role::Student, "place orders"));
        }
        validate_items(&items)?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            code: order_code(order_id),
            student_id: actor.user_id,
            status: OrderStatus::QrNotScanned,
            created_at: now,
            updated_at: now,
        };
        let qr = QrToken {
            order_id,
            payload: QrToken::payload_for(&order.code, order_id),
            scanned_at: None,
            scanned_by: None,
        };

        let detail = self.db.with_tx(|conn| -> Result<OrderDetail> {
            store::insert_order(conn, &order)?;

            let mut created = Vec::with_capacity(items.len());
            for (position, new_item) in items.into_iter().enumerate() {
                let item = OrderItem {
                    id: Uuid::new_v4(),
                    order_id,
                    kind: new_item.kind.trim().to_string(),
                    quantity: new_item.quantity,
                    remark: new_item.remark.filter(|r| !r.trim().is_empty()),
                    image_urls: new_item.image_urls.iter().map(|u| u.trim().to_string()).collect(),
                };
                store::insert_order_item(conn, &item, position)?;
                for url in &item.image_urls {
                    store::insert_item_image(conn, item.id, url, now)?;
                }
                created.push(item);
            }

            store::insert_qr_token(conn, &qr)?;

            Ok(OrderDetail {
                order: order.clone(),
                items: created,
                qr: qr.clone(),
            })
        })?;

        info!(
            "Order {} ({}) created by student {} with {} items",
            detail.order.code,
            detail.order.id,
            actor.user_id,
            detail.items.len()
        );
        Ok(detail)
    }

    /// Staff scan of an order's QR payload. Marks the token scanned and moves
    /// the order QR_NOT_SCANNED -> IN_PROGRESS in one transaction.
    pub fn scan(&self, actor: Actor, payload: &str) -> Result<Order> {
        let event = OrderEvent::Scan;
        if actor.role != event.actor() {
            return Err(LifecycleError::wrong_role(event.actor(), "scan QR codes"));
        }

        let now = Utc::now();
        self.db
            .with_tx(|conn| -> Result<Order> {
                let token = store::qr_by_payload(conn, payload)?
                    .ok_or_else(|| LifecycleError::not_found("QR token", payload))?;

                if token.is_scanned() {
                    return Err(LifecycleError::InvalidState(format!(
                        "QR token for order {} already scanned",
                        token.order_id
                    )));
                }

                if store::mark_qr_scanned(conn, token.order_id, actor.user_id, now)? == 0 {
                    return Err(LifecycleError::conflict("QR token", token.order_id));
                }

                apply_order_event(conn, actor, token.order_id, event, now)
            })
            .inspect(|order| info!("Order {} scanned by staff {}", order.code, actor.user_id))
            .inspect_err(|e| debug!("Scan rejected: {}", e))
    }

    /// Staff marks a washed order as ready: IN_PROGRESS -> PENDING, and the
    /// student is notified.
    pub fn mark_pending(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        self.order_transition(actor, order_id, OrderEvent::MarkPending)
    }

    /// The owning student confirms pickup: PENDING -> COMPLETED.
    pub fn complete(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        self.order_transition(actor, order_id, OrderEvent::Complete)
    }

    /// Attaches an image to one of the caller's order items. Not a
    /// transition; items are otherwise immutable.
    pub fn attach_item_image(&self, actor: Actor, order_id: Uuid, item_id: Uuid, url: &str) -> Result<OrderItem> {
        let url = validate_url(url)?;
        let now = Utc::now();

        self.db.with_tx(|conn| -> Result<OrderItem> {
            let order = store::order_by_id(conn, order_id)?
                .ok_or_else(|| LifecycleError::not_found("order", order_id))?;
            if order.student_id != actor.user_id {
                return Err(LifecycleError::Forbidden(
                    "only the student who placed the order may attach images".into(),
                ));
            }

            let mut item = store::items_for_order(conn, order_id)?
                .into_iter()
                .find(|item| item.id == item_id)
                .ok_or_else(|| LifecycleError::not_found("order item", item_id))?;

            store::insert_item_image(conn, item_id, url, now)?;
            item.image_urls.push(url.to_string());
            Ok(item)
        })
    }

    fn order_transition(&self, actor: Actor, order_id: Uuid, event: OrderEvent) -> Result<Order> {
        if actor.role != event.actor() {
            return Err(LifecycleError::wrong_role(event.actor(), event.name()));
        }

        let now = Utc::now();
        self.db
            .with_tx(|conn| apply_order_event(conn, actor, order_id, event, now))
            .inspect(|order| {
                info!(
                    "Order {} moved to {} by {} ({})",
                    order.code,
                    order.status,
                    actor.user_id,
                    event.name()
                )
            })
            .inspect_err(|e| debug!("Order {} {} rejected: {}", order_id, event.name(), e))
    }
}

/// Validates and applies one order event inside an open transaction:
/// ownership, transition table lookup, compare-and-swap on the status,
/// history row and optional notification.
fn apply_order_event(
    conn: &Connection,
    actor: Actor,
    order_id: Uuid,
    event: OrderEvent,
    now: DateTime<Utc>,
) -> Result<Order> {
    let mut order = store::order_by_id(conn, order_id)?
        .ok_or_else(|| LifecycleError::not_found("order", order_id))?;

    if event.owner_only() && order.student_id != actor.user_id {
        return Err(LifecycleError::Forbidden(format!(
            "order {} belongs to another student",
            order.code
        )));
    }

    let from = order.status;
    let to = from.apply(event).ok_or_else(|| LifecycleError::InvalidTransition {
        entity: "order",
        event: event.name(),
        from: from.to_string(),
    })?;

    if store::update_order_status(conn, order_id, from, to, now)? == 0 {
        return Err(LifecycleError::conflict("order", order_id));
    }
    store::insert_order_history(conn, order_id, from, to, actor.user_id, now)?;

    if let Some(kind) = event.notification() {
        notifications::insert_notification(
            conn,
            order.student_id,
            kind,
            &kind.message(&order.code),
            Some(order_id),
            now,
        )?;
    }

    order.status = to;
    order.updated_at = now;
    Ok(order)
}

fn order_code(id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("ORD-{}", &simple[..8])
}

fn validate_items(items: &[NewOrderItem]) -> Result<()> {
    if items.is_empty() {
        return Err(LifecycleError::Validation("an order needs at least one item".into()));
    }
    if items.len() > MAX_ITEMS_PER_ORDER {
        return Err(LifecycleError::Validation(format!(
            "an order may have at most {MAX_ITEMS_PER_ORDER} items"
        )));
    }
    for item in items {
        if item.kind.trim().is_empty() {
            return Err(LifecycleError::Validation("item kind is required".into()));
        }
        if item.quantity == 0 {
            return Err(LifecycleError::Validation(format!(
                "quantity for '{}' must be at least 1",
                item.kind.trim()
            )));
        }
        for url in &item.image_urls {
            validate_url(url)?;
        }
    }
    Ok(())
}

pub(crate) fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(url)
    } else {
        Err(LifecycleError::Validation(format!("image url must be http(s): {url:?}")))
    }
}
