use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use launderly_db::{Connection, notifications, orders as store};
use launderly_types::api::ComplaintDetail;
use launderly_types::models::{Actor, Complaint};
use launderly_types::status::ComplaintEvent;
use launderly_types::{ComplaintStatus, OrderStatus, Role};

use crate::orders::validate_url;
use crate::{LifecycleError, LifecycleManager, Result};

const MAX_DESCRIPTION_LEN: usize = 2000;

impl LifecycleManager {
    /// Opens a complaint on an order that is waiting for pickup. Only the
    /// student who placed the order may complain about it.
    pub fn create_complaint(
        &self,
        actor: Actor,
        order_id: Uuid,
        description: &str,
        image_urls: &[String],
    ) -> Result<ComplaintDetail> {
        if actor.role != Role::Student {
            return Err(LifecycleError::wrong_role(Role::Student, "file complaints"));
        }
        let description = description.trim();
        if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
            return Err(LifecycleError::Validation(format!(
                "description must be 1-{MAX_DESCRIPTION_LEN} characters"
            )));
        }
        let urls = image_urls
            .iter()
            .map(|url| validate_url(url).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        self.db
            .with_tx(|conn| -> Result<ComplaintDetail> {
                let order = store::order_by_id(conn, order_id)?
                    .ok_or_else(|| LifecycleError::not_found("order", order_id))?;

                if order.student_id != actor.user_id {
                    return Err(LifecycleError::Forbidden(format!(
                        "order {} belongs to another student",
                        order.code
                    )));
                }
                if order.status != OrderStatus::Pending {
                    return Err(LifecycleError::InvalidState(format!(
                        "complaints can only be filed while the order is {}, order {} is {}",
                        OrderStatus::Pending,
                        order.code,
                        order.status
                    )));
                }

                let complaint = Complaint {
                    id: Uuid::new_v4(),
                    order_id,
                    student_id: actor.user_id,
                    description: description.to_string(),
                    status: ComplaintStatus::Open,
                    created_at: now,
                    updated_at: now,
                };
                store::insert_complaint(conn, &complaint)?;
                for url in &urls {
                    store::insert_complaint_image(conn, complaint.id, url, now)?;
                }

                Ok(ComplaintDetail {
                    complaint,
                    image_urls: urls.clone(),
                })
            })
            .inspect(|detail| {
                info!(
                    "Complaint {} opened on order {} by {}",
                    detail.complaint.id, order_id, actor.user_id
                )
            })
    }

    /// Staff moves a complaint one step forward (OPEN -> IN_REVIEW ->
    /// RESOLVED) and the student is notified of the new state.
    pub fn advance_complaint(&self, actor: Actor, complaint_id: Uuid) -> Result<Complaint> {
        self.complaint_transition(actor, complaint_id, ComplaintEvent::Advance, None)
    }

    /// Like `advance_complaint`, but only applies while the complaint is
    /// still in `from`. Two staff members pressing "advance" on the same
    /// OPEN complaint get one IN_REVIEW and one `Conflict`, instead of the
    /// second silently resolving it.
    pub fn advance_complaint_from(
        &self,
        actor: Actor,
        complaint_id: Uuid,
        from: ComplaintStatus,
    ) -> Result<Complaint> {
        self.complaint_transition(actor, complaint_id, ComplaintEvent::Advance, Some(from))
    }

    /// The owning student closes a resolved complaint.
    pub fn close_complaint(&self, actor: Actor, complaint_id: Uuid) -> Result<Complaint> {
        self.complaint_transition(actor, complaint_id, ComplaintEvent::Close, None)
    }

    /// Adds an evidence image. Allowed for the owning student until the
    /// complaint is closed; writes no history.
    pub fn attach_complaint_image(&self, actor: Actor, complaint_id: Uuid, url: &str) -> Result<ComplaintDetail> {
        let url = validate_url(url)?;
        let now = Utc::now();

        self.db.with_tx(|conn| -> Result<ComplaintDetail> {
            let complaint = store::complaint_by_id(conn, complaint_id)?
                .ok_or_else(|| LifecycleError::not_found("complaint", complaint_id))?;

            if complaint.student_id != actor.user_id {
                return Err(LifecycleError::Forbidden(
                    "only the student who filed the complaint may attach evidence".into(),
                ));
            }
            if !complaint.status.accepts_evidence() {
                return Err(LifecycleError::InvalidState(format!(
                    "complaint {} is {} and no longer accepts evidence",
                    complaint.id, complaint.status
                )));
            }

            store::insert_complaint_image(conn, complaint_id, url, now)?;
            let image_urls = store::complaint_images(conn, complaint_id)?;
            Ok(ComplaintDetail {
                complaint,
                image_urls,
            })
        })
    }

    fn complaint_transition(
        &self,
        actor: Actor,
        complaint_id: Uuid,
        event: ComplaintEvent,
        expected: Option<ComplaintStatus>,
    ) -> Result<Complaint> {
        if actor.role != event.actor() {
            return Err(LifecycleError::wrong_role(event.actor(), &format!("{} complaints", event.name())));
        }

        let now = Utc::now();
        self.db
            .with_tx(|conn| apply_complaint_event(conn, actor, complaint_id, event, expected, now))
            .inspect(|complaint| {
                info!(
                    "Complaint {} moved to {} by {}",
                    complaint.id, complaint.status, actor.user_id
                )
            })
            .inspect_err(|e| debug!("Complaint {} {} rejected: {}", complaint_id, event.name(), e))
    }
}

fn apply_complaint_event(
    conn: &Connection,
    actor: Actor,
    complaint_id: Uuid,
    event: ComplaintEvent,
    expected: Option<ComplaintStatus>,
    now: DateTime<Utc>,
) -> Result<Complaint> {
    let mut complaint = store::complaint_by_id(conn, complaint_id)?
        .ok_or_else(|| LifecycleError::not_found("complaint", complaint_id))?;

    if event.owner_only() && complaint.student_id != actor.user_id {
        return Err(LifecycleError::Forbidden(
            "complaint belongs to another student".into(),
        ));
    }

    let from = complaint.status;
    if expected.is_some_and(|status| status != from) {
        return Err(LifecycleError::conflict("complaint", complaint_id));
    }
    let to = from.apply(event).ok_or_else(|| LifecycleError::InvalidTransition {
        entity: "complaint",
        event: event.name(),
        from: from.to_string(),
    })?;

    if store::update_complaint_status(conn, complaint_id, from, to, now)? == 0 {
        return Err(LifecycleError::conflict("complaint", complaint_id));
    }
    store::insert_complaint_history(conn, complaint_id, from, to, actor.user_id, now)?;

    if let Some(kind) = event.notification(to) {
        let reference = store::order_by_id(conn, complaint.order_id)?
            .map(|order| order.code)
            .unwrap_or_else(|| complaint.order_id.to_string());
        notifications::insert_notification(
            conn,
            complaint.student_id,
            kind,
            &kind.message(&reference),
            Some(complaint_id),
            now,
        )?;
    }

    complaint.status = to;
    complaint.updated_at = now;
    Ok(complaint)
}
