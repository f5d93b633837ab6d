//! Integration tests: drive orders, complaints and staff codes through the
//! lifecycle manager against an in-memory database.

use std::sync::Arc;
use std::thread;

use uuid::Uuid;

use launderly_db::notifications::notifications_for_user;
use launderly_db::{Database, NewUser};
use launderly_lifecycle::{Actor, LifecycleError, LifecycleManager};
use launderly_types::api::NewOrderItem;
use launderly_types::models::Order;
use launderly_types::{ComplaintStatus, NotificationKind, OrderStatus, Role, StaffCodeStatus};

struct Fixture {
    manager: LifecycleManager,
    student: Actor,
    other_student: Actor,
    staff: Actor,
}

fn new_user(role: Role, email: &str) -> NewUser {
    NewUser {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".into(),
        name: email.split('@').next().unwrap_or("user").to_string(),
        role,
        hostel_id: None,
        room_number: None,
        phone: None,
    }
}

fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let actor = |role, email| {
        let user = db.create_user(&new_user(role, email)).unwrap();
        Actor::new(user.id, role)
    };
    let student = actor(Role::Student, "meera@hostel.edu");
    let other_student = actor(Role::Student, "ravi@hostel.edu");
    let staff = actor(Role::Staff, "laundry@hostel.edu");

    Fixture {
        manager: LifecycleManager::new(db),
        student,
        other_student,
        staff,
    }
}

fn shirts(quantity: u32) -> Vec<NewOrderItem> {
    vec![NewOrderItem {
        kind: "shirt".into(),
        quantity,
        remark: Some("no bleach".into()),
        image_urls: vec![],
    }]
}

fn history_len(f: &Fixture, order: &Order) -> usize {
    f.manager.db().order_history(order.id).unwrap().len()
}

fn notification_count(f: &Fixture, user: Uuid) -> usize {
    f.manager
        .db()
        .with_conn(|conn| notifications_for_user(conn, user))
        .unwrap()
        .len()
}

/// Order placed, scanned, queued and collected by a staff member and student.
fn pending_order(f: &Fixture) -> Order {
    let detail = f.manager.create_order(f.student, shirts(3)).unwrap();
    f.manager.scan(f.staff, &detail.qr.payload).unwrap();
    f.manager.mark_pending(f.staff, detail.order.id).unwrap()
}

#[test]
fn order_end_to_end() {
    let f = fixture();

    let detail = f.manager.create_order(f.student, shirts(4)).unwrap();
    assert_eq!(detail.order.status, OrderStatus::QrNotScanned);
    assert_eq!(detail.qr.payload, format!("{}:{}", detail.order.code, detail.order.id));
    assert_eq!(history_len(&f, &detail.order), 0);

    let scanned = f.manager.scan(f.staff, &detail.qr.payload).unwrap();
    assert_eq!(scanned.status, OrderStatus::InProgress);
    let history = f.manager.db().order_history(detail.order.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_status, OrderStatus::QrNotScanned);
    assert_eq!(history[0].to_status, OrderStatus::InProgress);
    assert_eq!(history[0].actor_id, f.staff.user_id);

    let stored = f.manager.db().get_order_detail(detail.order.id).unwrap().unwrap();
    assert_eq!(stored.qr.scanned_by, Some(f.staff.user_id));
    assert!(stored.qr.scanned_at.is_some());

    // re-scan is rejected and leaves history untouched
    let rescan = f.manager.scan(f.staff, &detail.qr.payload);
    assert!(matches!(rescan, Err(LifecycleError::InvalidState(_))));
    assert_eq!(history_len(&f, &detail.order), 1);

    let pending = f.manager.mark_pending(f.staff, detail.order.id).unwrap();
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(history_len(&f, &detail.order), 2);

    let notes = f
        .manager
        .db()
        .with_conn(|conn| notifications_for_user(conn, f.student.user_id))
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::OrderPending);
    assert_eq!(notes[0].entity_id, Some(detail.order.id));
    assert!(notes[0].message.contains(&detail.order.code));

    let completed = f.manager.complete(f.student, detail.order.id).unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);

    let history = f.manager.db().order_history(detail.order.id).unwrap();
    assert_eq!(history.len(), 3);
    // each row starts where the previous one ended
    for pair in history.windows(2) {
        assert_eq!(pair[0].to_status, pair[1].from_status);
        assert!(pair[0].to_status < pair[1].to_status);
    }
}

#[test]
fn unknown_payload_is_not_found() {
    let f = fixture();
    let err = f.manager.scan(f.staff, "ORD-DEADBEEF:nope").unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn concurrent_scans_apply_once() {
    let f = fixture();
    let detail = f.manager.create_order(f.student, shirts(1)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = f.manager.clone();
            let payload = detail.qr.payload.clone();
            let staff = f.staff;
            thread::spawn(move || manager.scan(staff, &payload))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(
            matches!(err, LifecycleError::InvalidState(_) | LifecycleError::Conflict { .. }),
            "unexpected error: {err}"
        );
    }
    assert_eq!(history_len(&f, &detail.order), 1);
}

#[test]
fn failed_transitions_leave_no_trace() {
    let f = fixture();
    let detail = f.manager.create_order(f.student, shirts(2)).unwrap();
    let order_id = detail.order.id;

    let before_notes = notification_count(&f, f.student.user_id);

    // mark pending before scan
    let err = f.manager.mark_pending(f.staff, order_id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    // complete before pending
    f.manager.scan(f.staff, &detail.qr.payload).unwrap();
    let err = f.manager.complete(f.student, order_id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    let order = f.manager.db().get_order(order_id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::InProgress);
    assert_eq!(history_len(&f, &order), 1);
    assert_eq!(notification_count(&f, f.student.user_id), before_notes);

    // pending is not re-entrant
    f.manager.mark_pending(f.staff, order_id).unwrap();
    let err = f.manager.mark_pending(f.staff, order_id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    assert_eq!(history_len(&f, &order), 2);
    assert_eq!(notification_count(&f, f.student.user_id), before_notes + 1);
}

#[test]
fn wrong_actor_is_forbidden_in_any_state() {
    let f = fixture();
    let order = pending_order(&f);

    // staff cannot complete even though the order is PENDING
    let err = f.manager.complete(f.staff, order.id).unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    // a different student cannot complete someone else's order
    let err = f.manager.complete(f.other_student, order.id).unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    // students cannot scan or mark pending
    let fresh = f.manager.create_order(f.student, shirts(1)).unwrap();
    assert!(matches!(
        f.manager.scan(f.student, &fresh.qr.payload),
        Err(LifecycleError::Forbidden(_))
    ));
    assert!(matches!(
        f.manager.mark_pending(f.student, fresh.order.id),
        Err(LifecycleError::Forbidden(_))
    ));

    // staff cannot place orders
    assert!(matches!(
        f.manager.create_order(f.staff, shirts(1)),
        Err(LifecycleError::Forbidden(_))
    ));

    let complaint = f
        .manager
        .create_complaint(f.student, order.id, "Two shirts missing", &[])
        .unwrap()
        .complaint;
    for _ in 0..3 {
        let err = f.manager.advance_complaint(f.student, complaint.id).unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden(_)));
    }
    assert_eq!(
        f.manager.db().get_complaint(complaint.id).unwrap().unwrap().status,
        ComplaintStatus::Open
    );
}

#[test]
fn complaint_lifecycle() {
    let f = fixture();

    // not allowed before the order is pending
    let early = f.manager.create_order(f.student, shirts(1)).unwrap();
    let err = f
        .manager
        .create_complaint(f.student, early.order.id, "Stained", &[])
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidState(_)));

    let order = pending_order(&f);
    let err = f
        .manager
        .create_complaint(f.other_student, order.id, "Not mine", &[])
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let detail = f
        .manager
        .create_complaint(
            f.student,
            order.id,
            "  Blue shirt came back stained  ",
            &["https://img.example/stain.jpg".to_string()],
        )
        .unwrap();
    assert_eq!(detail.complaint.status, ComplaintStatus::Open);
    assert_eq!(detail.complaint.description, "Blue shirt came back stained");
    assert_eq!(detail.image_urls.len(), 1);
    let id = detail.complaint.id;

    // cannot close before resolution
    let err = f.manager.close_complaint(f.student, id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    let notes_before = notification_count(&f, f.student.user_id);
    assert_eq!(
        f.manager.advance_complaint(f.staff, id).unwrap().status,
        ComplaintStatus::InReview
    );
    assert_eq!(
        f.manager.advance_complaint(f.staff, id).unwrap().status,
        ComplaintStatus::Resolved
    );
    let err = f.manager.advance_complaint(f.staff, id).unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    let notes = f
        .manager
        .db()
        .with_conn(|conn| notifications_for_user(conn, f.student.user_id))
        .unwrap();
    assert_eq!(notes.len(), notes_before + 2);
    let kinds: Vec<&str> = notes.iter().take(2).map(|n| n.kind.as_str()).collect();
    assert_eq!(kinds, vec!["COMPLAINT_RESOLVED", "COMPLAINT_IN_REVIEW"]);

    // evidence still accepted while resolved
    let with_image = f
        .manager
        .attach_complaint_image(f.student, id, "https://img.example/second.jpg")
        .unwrap();
    assert_eq!(with_image.image_urls.len(), 2);

    let err = f.manager.close_complaint(f.other_student, id).unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));
    assert_eq!(
        f.manager.close_complaint(f.student, id).unwrap().status,
        ComplaintStatus::Closed
    );
    // closing sends nothing
    assert_eq!(notification_count(&f, f.student.user_id), notes_before + 2);

    let err = f
        .manager
        .attach_complaint_image(f.student, id, "https://img.example/late.jpg")
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidState(_)));

    let history = f.manager.db().complaint_history(id).unwrap();
    let path: Vec<_> = history.iter().map(|h| (h.from_status, h.to_status)).collect();
    assert_eq!(
        path,
        vec![
            (ComplaintStatus::Open, ComplaintStatus::InReview),
            (ComplaintStatus::InReview, ComplaintStatus::Resolved),
            (ComplaintStatus::Resolved, ComplaintStatus::Closed),
        ]
    );
}

#[test]
fn concurrent_advances_apply_once() {
    let f = fixture();
    let order = pending_order(&f);
    let complaint = f
        .manager
        .create_complaint(f.student, order.id, "Socks missing", &[])
        .unwrap()
        .complaint;
    let notes_before = notification_count(&f, f.student.user_id);

    // every racer saw OPEN and asks for the same step
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = f.manager.clone();
            let staff = f.staff;
            thread::spawn(move || manager.advance_complaint_from(staff, complaint.id, ComplaintStatus::Open))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].status, ComplaintStatus::InReview);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err, LifecycleError::InvalidTransition { .. } | LifecycleError::Conflict { .. }),
            "unexpected error: {err}"
        );
    }

    let history = f.manager.db().complaint_history(complaint.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_status, ComplaintStatus::Open);
    assert_eq!(history[0].to_status, ComplaintStatus::InReview);
    assert_eq!(notification_count(&f, f.student.user_id), notes_before + 1);
    assert_eq!(
        f.manager.db().get_complaint(complaint.id).unwrap().unwrap().status,
        ComplaintStatus::InReview
    );

    // the guarded step still moves on from the current status
    let resolved = f
        .manager
        .advance_complaint_from(f.staff, complaint.id, ComplaintStatus::InReview)
        .unwrap();
    assert_eq!(resolved.status, ComplaintStatus::Resolved);
}

#[test]
fn item_images_only_by_owner() {
    let f = fixture();
    let detail = f.manager.create_order(f.student, shirts(1)).unwrap();
    let item_id = detail.items[0].id;

    let err = f
        .manager
        .attach_item_image(f.other_student, detail.order.id, item_id, "https://img.example/x.jpg")
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let item = f
        .manager
        .attach_item_image(f.student, detail.order.id, item_id, "https://img.example/x.jpg")
        .unwrap();
    assert_eq!(item.image_urls, vec!["https://img.example/x.jpg".to_string()]);

    let err = f
        .manager
        .attach_item_image(f.student, detail.order.id, Uuid::new_v4(), "https://img.example/y.jpg")
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[test]
fn staff_code_redeems_once() {
    let f = fixture();
    let db = f.manager.db();
    db.create_staff_code("STF-ONCE0001").unwrap();

    let profile = f.manager.redeem_staff_code("STF-ONCE0001", f.staff.user_id).unwrap();
    assert_eq!(profile.staff_code, "STF-ONCE0001");

    let second_staff = db.create_user(&new_user(Role::Staff, "second@hostel.edu")).unwrap();
    let err = f
        .manager
        .redeem_staff_code("STF-ONCE0001", second_staff.id)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidState(_)));

    let codes = db.list_staff_codes().unwrap();
    assert!(codes[0].claimed);
    assert_eq!(codes[0].claimed_by, Some(f.staff.user_id));

    // students cannot redeem
    db.create_staff_code("STF-STUDENT1").unwrap();
    let err = f
        .manager
        .redeem_staff_code("STF-STUDENT1", f.student.user_id)
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    // lower-case input finds the stored upper-case code
    db.create_staff_code("STF-CASE0001").unwrap();
    let profile = f
        .manager
        .redeem_staff_code(" stf-case0001 ", second_staff.id)
        .unwrap();
    assert_eq!(profile.staff_code, "STF-CASE0001");

    let third_staff = db.create_user(&new_user(Role::Staff, "third@hostel.edu")).unwrap();
    let err = f.manager.redeem_staff_code("STF-MISSING", third_staff.id).unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { .. }));
}

#[test]
fn disabled_code_cannot_enroll() {
    let f = fixture();
    let db = f.manager.db();
    let code = db.create_staff_code("STF-DISABLED").unwrap();
    assert!(db.set_staff_code_status(code.id, StaffCodeStatus::Disabled).unwrap());

    let err = f
        .manager
        .enroll_staff("STF-DISABLED", new_user(Role::Staff, "late@hostel.edu"))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidState(_)));
    // the account was rolled back with the redemption
    assert!(db.get_user_by_email("late@hostel.edu").unwrap().is_none());
}

#[test]
fn concurrent_enrollment_claims_once() {
    let f = fixture();
    f.manager.db().create_staff_code("STF-RACE0001").unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let manager = f.manager.clone();
            thread::spawn(move || {
                manager.enroll_staff(
                    "STF-RACE0001",
                    new_user(Role::Staff, &format!("racer{i}@hostel.edu")),
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LifecycleError::InvalidState(_) | LifecycleError::Conflict { .. }))
    );

    let (user, profile) = winners[0];
    assert_eq!(profile.user_id, user.id);

    // losers left no accounts behind
    let db = f.manager.db();
    let survivors = (0..6)
        .filter(|i| {
            db.get_user_by_email(&format!("racer{i}@hostel.edu"))
                .unwrap()
                .is_some()
        })
        .count();
    assert_eq!(survivors, 1);
}
