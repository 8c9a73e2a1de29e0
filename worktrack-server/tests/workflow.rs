use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use tokio::sync::mpsc;
use worktrack_server::CoreError;
use worktrack_server::notify::{Dispatcher, Notifier, NotifyError, Recipient};
use worktrack_server::server::{AppConfig, AppState, config::NotificationsConfig};
use worktrack_server::storage::{ScanFilter, Store};
use worktrack_server::workflow::Submission;
use worktrack_shared::api::NotificationEvent;
use worktrack_shared::auth::Role;
use worktrack_shared::domain::{ApprovalStatus, TaskStatus};
use worktrack_shared::jwt;

struct Harness {
    state: AppState,
    db_path: PathBuf,
    _tempdir: tempfile::TempDir,
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "testsecret".into(),
        listen_port: None,
        dev_cors_origin: None,
        admins: vec![],
        notifications: NotificationsConfig::default(),
        bcrypt_cost: 4,
        trusted_proxies: vec![],
    }
}

async fn harness(dispatcher: Dispatcher) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let store = Store::connect_sqlite(db_path.to_str().unwrap())
        .await
        .expect("db");
    Harness {
        state: AppState::with_dispatcher(test_config(), store, dispatcher),
        db_path,
        _tempdir: dir,
    }
}

impl Harness {
    async fn user(&self, name: &str, role: Role) -> worktrack_server::storage::models::User {
        let email = format!("{}@example.com", name.to_lowercase());
        let id = self
            .state
            .identity
            .register_user(name, &email, "secret123", role)
            .await
            .unwrap();
        self.state.store.get_user(&id).await.unwrap().unwrap()
    }

    async fn task_for(&self, worker_id: &str, title: &str) -> i32 {
        self.state
            .workflow
            .create_task(title, None, worker_id)
            .await
            .unwrap()
            .id
    }
}

fn report(text: &str, hours: f64) -> Submission {
    Submission {
        report: text.into(),
        reported_status: Some(TaskStatus::Completed),
        hours_spent: hours,
    }
}

struct Recorder {
    tx: mpsc::UnboundedSender<(String, NotificationEvent)>,
}

#[async_trait]
impl Notifier for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn notify(&self, r: &Recipient, event: &NotificationEvent) -> Result<(), NotifyError> {
        let _ = self.tx.send((r.user_id.clone(), event.clone()));
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait]
impl Notifier for AlwaysFails {
    fn name(&self) -> &'static str {
        "always-fails"
    }

    async fn notify(&self, _: &Recipient, _: &NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Email("smtp unreachable".into()))
    }
}

#[tokio::test]
async fn approval_completes_task_and_updates_metrics() {
    let h = harness(Dispatcher::default()).await;
    let _admin = h.user("Root", Role::Admin).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;

    let submitted = h
        .state
        .workflow
        .submit_report(task_id, &worker, report("Counted aisle 3", 2.0))
        .await
        .unwrap();
    assert_eq!(submitted.status().unwrap(), TaskStatus::Submitted);
    assert_eq!(submitted.approval_status().unwrap(), ApprovalStatus::Pending);
    assert_eq!(submitted.submitted_by.as_deref(), Some(worker.id.as_str()));
    assert!(submitted.submitted_at.is_some());

    let approved = h.state.workflow.approve(task_id, None).await.unwrap();
    assert_eq!(approved.status().unwrap(), TaskStatus::Completed);
    assert_eq!(approved.approval_status().unwrap(), ApprovalStatus::Approved);
    assert_eq!(approved.admin_feedback.as_deref(), Some("Approved"));
    assert!(approved.approved_at.is_some());

    let m = h.state.store.get_metrics(&worker.id).await.unwrap().unwrap();
    assert_eq!(m.tasks_completed, 1);
    assert_eq!(m.tasks_assigned, 1);
    assert_eq!(m.completion_rate, 100);
    assert_eq!(m.total_hours_worked, 2.0);
}

#[tokio::test]
async fn rejection_then_resubmission_accumulates_hours() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;

    h.state
        .workflow
        .submit_report(task_id, &worker, report("First pass", 2.0))
        .await
        .unwrap();
    let rejected = h
        .state
        .workflow
        .reject(task_id, "Add the totals")
        .await
        .unwrap();
    assert_eq!(rejected.status().unwrap(), TaskStatus::InProgress);
    assert_eq!(rejected.approval_status().unwrap(), ApprovalStatus::Rejected);
    assert_eq!(rejected.admin_feedback.as_deref(), Some("Add the totals"));

    let resubmitted = h
        .state
        .workflow
        .submit_report(task_id, &worker, report("Totals added", 1.5))
        .await
        .unwrap();
    assert_eq!(resubmitted.status().unwrap(), TaskStatus::Submitted);
    assert_eq!(resubmitted.approval_status().unwrap(), ApprovalStatus::Pending);
    assert_eq!(resubmitted.hours_spent, 3.5);

    h.state
        .workflow
        .approve(task_id, Some("Great work"))
        .await
        .unwrap();
    let m = h.state.store.get_metrics(&worker.id).await.unwrap().unwrap();
    assert_eq!(m.total_hours_worked, 3.5);
    assert_eq!(m.completion_rate, 100);
}

#[tokio::test]
async fn rejection_requires_feedback() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;
    h.state
        .workflow
        .submit_report(task_id, &worker, report("Done", 1.0))
        .await
        .unwrap();

    let err = h.state.workflow.reject(task_id, "   ").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    let task = h.state.store.get_task(task_id).await.unwrap().unwrap();
    assert_eq!(task.status().unwrap(), TaskStatus::Submitted);
    assert_eq!(task.approval_status().unwrap(), ApprovalStatus::Pending);
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;

    let err = h.state.workflow.approve(task_id, None).await.unwrap_err();
    assert!(
        matches!(
            err,
            CoreError::InvalidStateTransition {
                actual: TaskStatus::Pending,
                ..
            }
        ),
        "{err:?}"
    );

    let err = h
        .state
        .workflow
        .submit_report(task_id, &worker, report("", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");

    let err = h
        .state
        .workflow
        .submit_report(task_id, &worker, report("Done", -1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");

    let started = h.state.workflow.start(task_id, &worker).await.unwrap();
    assert_eq!(started.status().unwrap(), TaskStatus::InProgress);

    h.state
        .workflow
        .submit_report(task_id, &worker, report("Done", 1.0))
        .await
        .unwrap();
    h.state.workflow.approve(task_id, None).await.unwrap();

    let err = h
        .state
        .workflow
        .submit_report(task_id, &worker, report("Again", 1.0))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            CoreError::InvalidStateTransition {
                actual: TaskStatus::Completed,
                ..
            }
        ),
        "{err:?}"
    );

    let err = h.state.workflow.approve(9999, None).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn only_the_assignee_may_submit() {
    let h = harness(Dispatcher::default()).await;
    let ada = h.user("Ada", Role::Worker).await;
    let bob = h.user("Bob", Role::Worker).await;
    let task_id = h.task_for(&ada.id, "Inventory").await;

    let err = h
        .state
        .workflow
        .submit_report(task_id, &bob, report("Not mine", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden), "{err:?}");
}

#[tokio::test]
async fn tasks_require_title_and_worker_assignee() {
    let h = harness(Dispatcher::default()).await;
    let admin = h.user("Root", Role::Admin).await;
    let worker = h.user("Ada", Role::Worker).await;

    let err = h
        .state
        .workflow
        .create_task("  ", None, &worker.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = h
        .state
        .workflow
        .create_task("Audit", None, "no-such-user")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    let err = h
        .state
        .workflow
        .create_task("Audit", None, &admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let task = h
        .state
        .workflow
        .create_task("Audit", Some("Quarterly"), &worker.id)
        .await
        .unwrap();
    assert_eq!(task.status().unwrap(), TaskStatus::Pending);
    assert_eq!(task.approval_status().unwrap(), ApprovalStatus::Pending);
    assert_eq!(task.hours_spent, 0.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_review_has_exactly_one_winner() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;

    for i in 0..5 {
        let task_id = h.task_for(&worker.id, &format!("Task {i}")).await;
        h.state
            .workflow
            .submit_report(task_id, &worker, report("Done", 1.0))
            .await
            .unwrap();

        let a = h.state.workflow.clone();
        let b = h.state.workflow.clone();
        let (approve, reject) = tokio::join!(
            tokio::spawn(async move { a.approve(task_id, None).await }),
            tokio::spawn(async move { b.reject(task_id, "Redo").await }),
        );
        let approve = approve.unwrap();
        let reject = reject.unwrap();
        assert!(
            approve.is_ok() ^ reject.is_ok(),
            "approve={approve:?} reject={reject:?}"
        );
        let loser = if approve.is_ok() { reject } else { approve };
        assert!(matches!(
            loser,
            Err(CoreError::InvalidStateTransition { .. })
        ));

        let task = h.state.store.get_task(task_id).await.unwrap().unwrap();
        let status = task.status().unwrap();
        let approval = task.approval_status().unwrap();
        assert_eq!(
            status == TaskStatus::Completed,
            approval == ApprovalStatus::Approved
        );
        if approval == ApprovalStatus::Rejected {
            assert_eq!(status, TaskStatus::InProgress);
        }
    }
}

#[tokio::test]
async fn completion_rate_two_of_three() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let idle = h.user("Bob", Role::Worker).await;

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(h.task_for(&worker.id, &format!("Task {i}")).await);
    }
    for id in &ids[..2] {
        h.state
            .workflow
            .submit_report(*id, &worker, report("Done", 1.0))
            .await
            .unwrap();
        h.state.workflow.approve(*id, None).await.unwrap();
    }

    let all = h.state.metrics.all_metrics().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].user.id, worker.id);
    assert_eq!(all[0].metrics.tasks_completed, 2);
    assert_eq!(all[0].metrics.tasks_assigned, 3);
    assert_eq!(all[0].metrics.completion_rate, 67);
    assert!(all[0].stored);

    // Workers without a stored row are derived on the fly
    assert_eq!(all[1].user.id, idle.id);
    assert_eq!(all[1].metrics.completion_rate, 0);
    assert!(!all[1].stored);

    let (_, breakdown) = h
        .state
        .metrics
        .employee_performance(&worker.id)
        .await
        .unwrap();
    assert_eq!(breakdown.tasks_completed, 2);
    assert_eq!(breakdown.tasks_assigned, 3);
    assert_eq!(breakdown.completion_rate, 67);
    assert_eq!(breakdown.total_hours_worked, 2.0);

    assert_eq!(h.state.metrics.rebuild_all().await.unwrap(), 2);
    let rebuilt = h.state.store.get_metrics(&idle.id).await.unwrap().unwrap();
    assert_eq!(rebuilt.tasks_assigned, 0);
}

#[tokio::test]
async fn qr_issuance_is_idempotent_and_scans_are_bound_to_user() {
    let h = harness(Dispatcher::default()).await;
    let ada = h.user("Ada", Role::Worker).await;
    let bob = h.user("Bob", Role::Worker).await;

    let first = h.state.qr.issue_credential(&ada.id).await.unwrap();
    let second = h.state.qr.issue_credential(&ada.id).await.unwrap();
    assert_eq!(first.qr_token, second.qr_token);
    assert_eq!(first.qr_payload, second.qr_payload);
    assert!(first.qr_image.starts_with("data:image/png;base64,"));
    assert!(!first.is_activated);
    assert_eq!(first.scan_count, 0);

    let err = h
        .state
        .qr
        .record_scan(&bob.id, &first.qr_token, "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CredentialNotFound), "{err:?}");

    let receipt = h
        .state
        .qr
        .record_scan(&ada.id, &first.qr_token, "10.0.0.1")
        .await
        .unwrap();
    assert_eq!(receipt.scan_count, 1);
    let activated = h.state.store.get_credential(&ada.id).await.unwrap().unwrap();
    assert!(activated.is_activated);
    let first_scan_at = activated.first_scan_at.expect("first scan recorded");

    let receipt = h
        .state
        .qr
        .scan_payload(&first.qr_payload, "10.0.0.2")
        .await
        .unwrap();
    assert_eq!(receipt.user_id, ada.id);
    assert_eq!(receipt.scan_count, 2);
    let after = h.state.store.get_credential(&ada.id).await.unwrap().unwrap();
    assert_eq!(after.first_scan_at, Some(first_scan_at));

    let records = h.state.qr.list_scans(ScanFilter::default()).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].scan.scanner_ip, "10.0.0.2");
    assert_eq!(records[0].user_name, "Ada");
    assert!(records[0].is_activated);
    assert_eq!(records[0].scan_count, 2);

    let (cred, scans) = h
        .state
        .qr
        .user_scans(&bob.id, ScanFilter::default())
        .await
        .unwrap();
    assert!(cred.is_none());
    assert!(scans.is_empty());
}

#[tokio::test]
async fn tampered_qr_payload_is_rejected() {
    let h = harness(Dispatcher::default()).await;
    let ada = h.user("Ada", Role::Worker).await;
    let cred = h.state.qr.issue_credential(&ada.id).await.unwrap();
    let mut tampered = cred.qr_payload.clone();
    tampered.push('x');
    let err = h
        .state
        .qr
        .scan_payload(&tampered, "10.0.0.1")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    let unchanged = h.state.store.get_credential(&ada.id).await.unwrap().unwrap();
    assert_eq!(unchanged.scan_count, 0);
}

#[tokio::test]
async fn submission_notifies_admins_and_review_notifies_submitter() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let h = harness(Dispatcher::new(vec![Arc::new(Recorder { tx })])).await;
    let admin = h.user("Root", Role::Admin).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;

    h.state
        .workflow
        .submit_report(task_id, &worker, report("Counted", 2.0))
        .await
        .unwrap();
    let (to, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(to, admin.id);
    match event {
        NotificationEvent::TaskSubmitted {
            task_id: id,
            worker_name,
            reported_status,
            hours_spent,
            ..
        } => {
            assert_eq!(id, task_id);
            assert_eq!(worker_name, "Ada");
            assert_eq!(reported_status, Some(TaskStatus::Completed));
            assert_eq!(hours_spent, 2.0);
        }
        other => panic!("unexpected event {other:?}"),
    }

    h.state.workflow.reject(task_id, "More detail").await.unwrap();
    let (to, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(to, worker.id);
    assert_eq!(
        event,
        NotificationEvent::TaskRejected {
            task_id,
            title: "Inventory".into(),
            feedback: "More detail".into(),
        }
    );
}

#[tokio::test]
async fn failing_notifier_does_not_fail_workflow() {
    let h = harness(Dispatcher::new(vec![Arc::new(AlwaysFails)])).await;
    let _admin = h.user("Root", Role::Admin).await;
    let worker = h.user("Ada", Role::Worker).await;
    let task_id = h.task_for(&worker.id, "Inventory").await;

    h.state
        .workflow
        .submit_report(task_id, &worker, report("Done", 1.0))
        .await
        .unwrap();
    let task = h.state.workflow.approve(task_id, None).await.unwrap();
    assert_eq!(task.status().unwrap(), TaskStatus::Completed);
}

#[tokio::test]
async fn inbox_sink_persists_notifications() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let inbox = Dispatcher::from_config(&NotificationsConfig::default(), &h.state.store);
    assert_eq!(inbox.sink_names(), vec!["log", "inbox"]);

    inbox.dispatch(
        vec![Recipient::from(&worker)],
        NotificationEvent::TaskApproved {
            task_id: 1,
            title: "Inventory".into(),
            feedback: "Approved".into(),
        },
    );

    let mut count = 0;
    for _ in 0..50 {
        count = h
            .state
            .store
            .unread_notification_count(&worker.id)
            .await
            .unwrap();
        if count > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(count, 1);
    let items = h
        .state
        .store
        .list_notifications(&worker.id, true, 10)
        .await
        .unwrap();
    assert_eq!(items[0].kind, "task_approved");
    assert!(
        h.state
            .store
            .mark_notification_read(&worker.id, items[0].id)
            .await
            .unwrap()
    );
    assert_eq!(
        h.state
            .store
            .unread_notification_count(&worker.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn identity_rules() {
    let h = harness(Dispatcher::default()).await;
    let id = h
        .state
        .identity
        .register_user("Ada", "ada@example.com", "secret123", Role::Worker)
        .await
        .unwrap();

    let err = h
        .state
        .identity
        .register_user("Ada 2", "ada@example.com", "secret123", Role::Worker)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateEmail), "{err:?}");
    let err = h
        .state
        .identity
        .register_user("Bob", "bob@example", "secret123", Role::Worker)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    let err = h
        .state
        .identity
        .register_user("Bob", "bob@example.com", "12345", Role::Worker)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");
    let err = h
        .state
        .identity
        .register_user("", "bob@example.com", "secret123", Role::Worker)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)), "{err:?}");

    let err = h
        .state
        .identity
        .authenticate("ada@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCredentials));
    let err = h
        .state
        .identity
        .authenticate("nobody@example.com", "secret123")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCredentials));

    let session = h
        .state
        .identity
        .authenticate("ada@example.com", "secret123")
        .await
        .unwrap();
    assert_eq!(session.user.id, id);
    assert_eq!(session.expires_in, 7 * 24 * 3600);
    let claims = h
        .state
        .identity
        .verify_access(&session.access_token)
        .unwrap();
    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, Role::Worker);
    assert!(
        h.state
            .identity
            .verify_access(&session.refresh_token)
            .is_err()
    );

    let err = h
        .state
        .identity
        .refresh(&session.access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRefreshToken));
    let (token, _) = h
        .state
        .identity
        .refresh(&session.refresh_token)
        .await
        .unwrap();
    assert_eq!(h.state.identity.verify_access(&token).unwrap().sub, id);
}

#[tokio::test]
async fn assigning_a_task_refreshes_stored_metrics() {
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let first = h.task_for(&worker.id, "Inventory").await;
    h.state
        .workflow
        .submit_report(first, &worker, report("Done", 1.5))
        .await
        .unwrap();
    h.state.workflow.approve(first, None).await.unwrap();
    let m = h.state.store.get_metrics(&worker.id).await.unwrap().unwrap();
    assert_eq!(m.completion_rate, 100);

    h.task_for(&worker.id, "Restock").await;
    let all = h.state.metrics.all_metrics().await.unwrap();
    assert!(all[0].stored);
    assert_eq!(all[0].metrics.tasks_assigned, 2);
    assert_eq!(all[0].metrics.tasks_completed, 1);
    assert_eq!(all[0].metrics.completion_rate, 50);
    assert_eq!(all[0].metrics.total_hours_worked, 1.5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_count_every_scan() {
    const SCANS: usize = 16;
    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let cred = h.state.qr.issue_credential(&worker.id).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..SCANS {
        let qr = h.state.qr.clone();
        let uid = worker.id.clone();
        let token = cred.qr_token.clone();
        handles.push(tokio::spawn(async move {
            qr.record_scan(&uid, &token, &format!("10.0.0.{i}")).await
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, SCANS);

    let after = h
        .state
        .store
        .get_credential(&worker.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.scan_count as usize, ok);
    assert!(after.is_activated);

    let scans = h
        .state
        .store
        .list_scans(ScanFilter {
            user_id: Some(worker.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scans.len(), SCANS);
    let first = after.first_scan_at.expect("first scan recorded");
    assert!(scans.iter().any(|r| r.scan.scanned_at == first));
}

#[tokio::test]
async fn refresh_reads_role_and_name_from_storage() {
    use worktrack_server::storage::schema::users;

    let h = harness(Dispatcher::default()).await;
    let worker = h.user("Ada", Role::Worker).await;
    let session = h
        .state
        .identity
        .authenticate("ada@example.com", "secret123")
        .await
        .unwrap();

    let mut conn = SqliteConnection::establish(h.db_path.to_str().unwrap()).unwrap();
    diesel::update(users::table.filter(users::id.eq(&worker.id)))
        .set((
            users::name.eq("Ada Lovelace"),
            users::role.eq(Role::Admin.as_str()),
        ))
        .execute(&mut conn)
        .unwrap();

    let (token, _) = h
        .state
        .identity
        .refresh(&session.refresh_token)
        .await
        .unwrap();
    let claims = jwt::decode_and_verify(&token, b"testsecret").unwrap();
    assert_eq!(claims.sub, worker.id);
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.name, "Ada Lovelace");
}

#[tokio::test]
async fn unusable_stored_hash_is_invalid_credentials() {
    let h = harness(Dispatcher::default()).await;
    assert!(
        h.state
            .identity
            .ensure_user_with_hash("Root", "root@example.com", "not-a-bcrypt-hash", Role::Admin)
            .await
            .unwrap()
    );
    let err = h
        .state
        .identity
        .authenticate("root@example.com", "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidCredentials), "{err:?}");
}
