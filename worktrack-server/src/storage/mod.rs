pub mod models;
pub mod schema;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::Sqlite;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{
    Attendance, NewAttendance, NewNotification, NewPushSubscription, NewQrCredential, NewQrScan,
    NewTask, NewUser, Notification, PerformanceMetrics, PushSubscription, QrCredential, QrScan,
    QrScanRecord, Task, TaskChanges, User,
};
use tracing::trace;
use worktrack_shared::auth::Role;
use worktrack_shared::domain::{ApprovalStatus, AttendanceAction, ParseEnumError, TaskStatus};

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored enum column holds a value this build does not know.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),

    /// A stored JSON payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _
            ))
        )
    }
}

/// Filter for [`Store::list_tasks`]. Empty filter lists every task.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub approval_status: Option<ApprovalStatus>,
}

/// Changes applied by [`Store::cas_update_task`] when the expected status
/// matches.
#[derive(Debug, Clone)]
pub struct TaskPatch {
    pub status: TaskStatus,
    pub approval_status: Option<ApprovalStatus>,
    pub daily_report: Option<String>,
    /// Added to `hours_spent`; never replaces it.
    pub add_hours: Option<f64>,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    pub admin_feedback: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            approval_status: None,
            daily_report: None,
            add_hours: None,
            submitted_by: None,
            submitted_at: None,
            admin_feedback: None,
            approved_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CasOutcome {
    Updated(Task),
    NotFound,
    /// The row exists but its status is not one of the expected ones.
    Conflict { actual: TaskStatus },
}

#[derive(Debug, Clone)]
pub struct ScanFilter {
    pub user_id: Option<String>,
    pub page: usize,
    pub per_page: usize,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            page: 1,
            per_page: 100,
        }
    }
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;
        let store = Store { pool };

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        store
            .run(|conn| {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await?;

        Ok(store)
    }

    /// Runs `f` on a pooled connection inside `spawn_blocking`.
    async fn run<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    // Users

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, StorageError> {
        use schema::users;
        let id = uuid::Uuid::new_v4().to_string();
        let name = name.to_string();
        let email = email.to_string();
        let hash = password_hash.to_string();
        self.run(move |conn| {
            let row = NewUser {
                id: &id,
                name: &name,
                email: &email,
                password_hash: &hash,
                role: role.as_str(),
                created_at: Utc::now().naive_utc(),
            };
            Ok(diesel::insert_into(users::table)
                .values(&row)
                .returning(User::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        use schema::users::dsl::*;
        let uid = user_id.to_string();
        self.run(move |conn| {
            Ok(users
                .filter(id.eq(&uid))
                .first::<User>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn get_user_by_email(&self, address: &str) -> Result<Option<User>, StorageError> {
        use schema::users::dsl::*;
        let address = address.to_string();
        self.run(move |conn| {
            Ok(users
                .filter(email.eq(&address))
                .first::<User>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        use schema::users::dsl::*;
        self.run(move |conn| Ok(users.order((name.asc(), id.asc())).load::<User>(conn)?))
            .await
    }

    pub async fn list_users_by_role(&self, wanted: Role) -> Result<Vec<User>, StorageError> {
        use schema::users::dsl::*;
        self.run(move |conn| {
            Ok(users
                .filter(role.eq(wanted.as_str()))
                .order((name.asc(), id.asc()))
                .load::<User>(conn)?)
        })
        .await
    }

    pub async fn list_workers(&self) -> Result<Vec<User>, StorageError> {
        self.list_users_by_role(Role::Worker).await
    }

    // Tasks

    pub async fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
        assigned_to: &str,
    ) -> Result<Task, StorageError> {
        use schema::tasks;
        let title = title.to_string();
        let description = description.map(|s| s.to_string());
        let assignee = assigned_to.to_string();
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            let row = NewTask {
                title: &title,
                description: description.as_deref(),
                assigned_to: &assignee,
                status: TaskStatus::Pending.as_str(),
                approval_status: ApprovalStatus::Pending.as_str(),
                hours_spent: 0.0,
                created_at: now,
                updated_at: now,
            };
            Ok(diesel::insert_into(tasks::table)
                .values(&row)
                .returning(Task::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    pub async fn get_task(&self, task_id: i32) -> Result<Option<Task>, StorageError> {
        use schema::tasks::dsl::*;
        self.run(move |conn| {
            Ok(tasks
                .filter(id.eq(task_id))
                .first::<Task>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StorageError> {
        use schema::tasks;
        self.run(move |conn| {
            let mut query: tasks::BoxedQuery<'_, Sqlite> = tasks::table.into_boxed();
            if let Some(assignee) = filter.assigned_to {
                query = query.filter(tasks::assigned_to.eq(assignee));
            }
            if let Some(status) = filter.status {
                query = query.filter(tasks::status.eq(status.as_str()));
            }
            if let Some(approval) = filter.approval_status {
                query = query.filter(tasks::approval_status.eq(approval.as_str()));
            }
            Ok(query
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .load::<Task>(conn)?)
        })
        .await
    }

    pub async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, StorageError> {
        self.list_tasks(TaskFilter {
            assigned_to: Some(user_id.to_string()),
            ..TaskFilter::default()
        })
        .await
    }

    /// Submitted tasks awaiting review with the submitter's name, most
    /// recent submission first.
    pub async fn list_pending_approvals(
        &self,
    ) -> Result<Vec<(Task, Option<String>)>, StorageError> {
        use schema::{tasks, users};
        self.run(move |conn| {
            Ok(tasks::table
                .left_join(users::table.on(users::id.nullable().eq(tasks::submitted_by)))
                .filter(tasks::status.eq(TaskStatus::Submitted.as_str()))
                .filter(tasks::approval_status.eq(ApprovalStatus::Pending.as_str()))
                .order((tasks::submitted_at.desc(), tasks::id.desc()))
                .select((Task::as_select(), users::name.nullable()))
                .load::<(Task, Option<String>)>(conn)?)
        })
        .await
    }

    /// Applies `patch` only if the task's current status is one of
    /// `expected`.
    ///
    /// The read and the guarded write run inside one IMMEDIATE transaction,
    /// so two concurrent transitions out of the same state cannot both
    /// succeed: the second observes the new status and gets
    /// [`CasOutcome::Conflict`].
    pub async fn cas_update_task(
        &self,
        task_id: i32,
        expected: &[TaskStatus],
        patch: TaskPatch,
    ) -> Result<CasOutcome, StorageError> {
        use schema::tasks;
        let expected = expected.to_vec();
        trace!(task_id, ?expected, to = %patch.status, "cas_update_task starting");
        self.run(move |conn| {
            conn.immediate_transaction(|conn| -> Result<CasOutcome, StorageError> {
                let current = tasks::table
                    .filter(tasks::id.eq(task_id))
                    .first::<Task>(conn)
                    .optional()?;
                let Some(current) = current else {
                    return Ok(CasOutcome::NotFound);
                };
                let actual = current.status()?;
                if !expected.contains(&actual) {
                    return Ok(CasOutcome::Conflict { actual });
                }

                let changes = TaskChanges {
                    status: patch.status.as_str(),
                    approval_status: patch.approval_status.map(|a| a.as_str()),
                    daily_report: patch.daily_report.as_deref(),
                    submitted_by: patch.submitted_by.as_deref(),
                    submitted_at: patch.submitted_at,
                    admin_feedback: patch.admin_feedback.as_deref(),
                    approved_at: patch.approved_at,
                    updated_at: Utc::now().naive_utc(),
                };
                let updated = diesel::update(
                    tasks::table
                        .filter(tasks::id.eq(task_id))
                        .filter(tasks::status.eq(actual.as_str())),
                )
                .set(&changes)
                .execute(conn)?;
                if updated == 0 {
                    return Ok(CasOutcome::Conflict { actual });
                }
                if let Some(hours) = patch.add_hours {
                    diesel::update(tasks::table.filter(tasks::id.eq(task_id)))
                        .set(tasks::hours_spent.eq(tasks::hours_spent + hours))
                        .execute(conn)?;
                }

                let task = tasks::table
                    .filter(tasks::id.eq(task_id))
                    .first::<Task>(conn)?;
                Ok(CasOutcome::Updated(task))
            })
        })
        .await
    }

    // QR credentials

    pub async fn get_credential(&self, uid: &str) -> Result<Option<QrCredential>, StorageError> {
        use schema::qr_credentials::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            Ok(qr_credentials
                .filter(user_id.eq(&uid))
                .first::<QrCredential>(conn)
                .optional()?)
        })
        .await
    }

    /// Inserts the credential unless the user already has one, then returns
    /// whichever row is stored. Concurrent first issuance converges on a
    /// single credential.
    pub async fn create_credential_if_absent(
        &self,
        uid: &str,
        token: &str,
        payload: &str,
        image: &str,
        generated: NaiveDateTime,
    ) -> Result<QrCredential, StorageError> {
        use schema::qr_credentials::dsl as qc;
        let uid = uid.to_string();
        let token = token.to_string();
        let payload = payload.to_string();
        let image = image.to_string();
        self.run(move |conn| {
            let row = NewQrCredential {
                user_id: &uid,
                qr_token: &token,
                qr_payload: &payload,
                qr_image: &image,
                generated_at: generated,
            };
            diesel::insert_into(qc::qr_credentials)
                .values(&row)
                .on_conflict(qc::user_id)
                .do_nothing()
                .execute(conn)?;
            Ok(qc::qr_credentials
                .filter(qc::user_id.eq(&uid))
                .first::<QrCredential>(conn)?)
        })
        .await
    }

    /// Appends a scan and bumps the credential counters for the exact
    /// `(user, token)` pair. Returns `None` when no credential matches.
    pub async fn record_scan(
        &self,
        uid: &str,
        token: &str,
        scanner_ip: &str,
        scanned_at: NaiveDateTime,
    ) -> Result<Option<QrCredential>, StorageError> {
        use schema::qr_credentials::dsl as qc;
        use schema::qr_scans;
        let uid = uid.to_string();
        let token = token.to_string();
        let ip = scanner_ip.to_string();
        self.run(move |conn| {
            conn.immediate_transaction(|conn| -> Result<Option<QrCredential>, StorageError> {
                let matched = qc::qr_credentials
                    .filter(qc::user_id.eq(&uid))
                    .filter(qc::qr_token.eq(&token))
                    .count()
                    .get_result::<i64>(conn)?;
                if matched == 0 {
                    return Ok(None);
                }
                let scan = NewQrScan {
                    user_id: &uid,
                    qr_token: &token,
                    scanned_at,
                    scanner_ip: &ip,
                };
                diesel::insert_into(qr_scans::table)
                    .values(&scan)
                    .execute(conn)?;
                diesel::update(qc::qr_credentials.filter(qc::user_id.eq(&uid)))
                    .set((
                        qc::scan_count.eq(qc::scan_count + 1),
                        qc::is_activated.eq(true),
                    ))
                    .execute(conn)?;
                diesel::update(
                    qc::qr_credentials
                        .filter(qc::user_id.eq(&uid))
                        .filter(qc::first_scan_at.is_null()),
                )
                .set(qc::first_scan_at.eq(Some(scanned_at)))
                .execute(conn)?;
                Ok(Some(
                    qc::qr_credentials
                        .filter(qc::user_id.eq(&uid))
                        .first::<QrCredential>(conn)?,
                ))
            })
        })
        .await
    }

    /// Scans joined with user and credential state, most recent first.
    pub async fn list_scans(&self, filter: ScanFilter) -> Result<Vec<QrScanRecord>, StorageError> {
        use schema::{qr_credentials, qr_scans, users};
        let page = filter.page.max(1);
        let per_page = filter.per_page.clamp(1, 1000) as i64;
        let offset = ((page as i64) - 1) * per_page;
        self.run(move |conn| {
            let mut query = qr_scans::table
                .inner_join(users::table)
                .left_join(
                    qr_credentials::table.on(qr_credentials::user_id.eq(qr_scans::user_id)),
                )
                .select((
                    QrScan::as_select(),
                    users::name,
                    users::email,
                    qr_credentials::is_activated.nullable(),
                    qr_credentials::scan_count.nullable(),
                ))
                .into_boxed();
            if let Some(uid) = filter.user_id {
                query = query.filter(qr_scans::user_id.eq(uid));
            }
            let rows = query
                .order((qr_scans::scanned_at.desc(), qr_scans::id.desc()))
                .offset(offset)
                .limit(per_page)
                .load::<(QrScan, String, String, Option<bool>, Option<i32>)>(conn)?;
            Ok(rows
                .into_iter()
                .map(|(scan, user_name, user_email, activated, count)| QrScanRecord {
                    scan,
                    user_name,
                    user_email,
                    is_activated: activated.unwrap_or(false),
                    scan_count: count.unwrap_or(0),
                })
                .collect())
        })
        .await
    }

    // Performance metrics

    pub async fn get_metrics(
        &self,
        uid: &str,
    ) -> Result<Option<PerformanceMetrics>, StorageError> {
        use schema::performance_metrics::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            Ok(performance_metrics
                .filter(user_id.eq(&uid))
                .first::<PerformanceMetrics>(conn)
                .optional()?)
        })
        .await
    }

    pub async fn upsert_metrics(
        &self,
        metrics: PerformanceMetrics,
    ) -> Result<PerformanceMetrics, StorageError> {
        use schema::performance_metrics::dsl::*;
        self.run(move |conn| {
            diesel::insert_into(performance_metrics)
                .values(&metrics)
                .on_conflict(user_id)
                .do_update()
                .set(&metrics)
                .execute(conn)?;
            Ok(metrics)
        })
        .await
    }

    /// Stored metrics rows for workers, best completion rate first.
    pub async fn list_metrics(&self) -> Result<Vec<(PerformanceMetrics, User)>, StorageError> {
        use schema::{performance_metrics, users};
        self.run(move |conn| {
            Ok(performance_metrics::table
                .inner_join(users::table)
                .filter(users::role.eq(Role::Worker.as_str()))
                .order((
                    performance_metrics::completion_rate.desc(),
                    users::name.asc(),
                ))
                .select((PerformanceMetrics::as_select(), User::as_select()))
                .load::<(PerformanceMetrics, User)>(conn)?)
        })
        .await
    }

    // Attendance

    pub async fn record_attendance(
        &self,
        uid: &str,
        action: AttendanceAction,
        at: NaiveDateTime,
    ) -> Result<Attendance, StorageError> {
        use schema::attendance;
        let uid = uid.to_string();
        self.run(move |conn| {
            let row = NewAttendance {
                user_id: &uid,
                action: action.as_str(),
                recorded_at: at,
            };
            Ok(diesel::insert_into(attendance::table)
                .values(&row)
                .returning(Attendance::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    pub async fn list_attendance(&self, uid: &str) -> Result<Vec<Attendance>, StorageError> {
        use schema::attendance::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            Ok(attendance
                .filter(user_id.eq(&uid))
                .order((recorded_at.desc(), id.desc()))
                .load::<Attendance>(conn)?)
        })
        .await
    }

    // Notification inbox

    pub async fn insert_notification(
        &self,
        uid: &str,
        event_kind: &str,
        event: &worktrack_shared::api::NotificationEvent,
    ) -> Result<Notification, StorageError> {
        use schema::notifications;
        let uid = uid.to_string();
        let event_kind = event_kind.to_string();
        let body = serde_json::to_string(event)?;
        self.run(move |conn| {
            let row = NewNotification {
                user_id: &uid,
                kind: &event_kind,
                payload: &body,
                created_at: Utc::now().naive_utc(),
            };
            Ok(diesel::insert_into(notifications::table)
                .values(&row)
                .returning(Notification::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    pub async fn list_notifications(
        &self,
        uid: &str,
        unread_only: bool,
        max: i64,
    ) -> Result<Vec<Notification>, StorageError> {
        use schema::notifications::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            let mut query = notifications.filter(user_id.eq(uid)).into_boxed();
            if unread_only {
                query = query.filter(read_at.is_null());
            }
            Ok(query
                .order((created_at.desc(), id.desc()))
                .limit(max.clamp(1, 500))
                .load::<Notification>(conn)?)
        })
        .await
    }

    pub async fn unread_notification_count(&self, uid: &str) -> Result<i64, StorageError> {
        use schema::notifications::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            Ok(notifications
                .filter(user_id.eq(&uid))
                .filter(read_at.is_null())
                .count()
                .get_result::<i64>(conn)?)
        })
        .await
    }

    /// Marks one of the user's notifications read. Returns `false` when the
    /// id does not belong to the user.
    pub async fn mark_notification_read(
        &self,
        uid: &str,
        notification_id: i32,
    ) -> Result<bool, StorageError> {
        use schema::notifications::dsl::*;
        let uid = uid.to_string();
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            let owned = notifications
                .filter(id.eq(notification_id))
                .filter(user_id.eq(&uid))
                .count()
                .get_result::<i64>(conn)?;
            diesel::update(
                notifications
                    .filter(id.eq(notification_id))
                    .filter(user_id.eq(&uid))
                    .filter(read_at.is_null()),
            )
            .set(read_at.eq(Some(now)))
            .execute(conn)?;
            Ok(owned > 0)
        })
        .await
    }

    // Push subscriptions

    pub async fn upsert_push_subscription(
        &self,
        uid: &str,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription, StorageError> {
        use schema::push_subscriptions::dsl as ps;
        let uid = uid.to_string();
        let endpoint_owned = endpoint.to_string();
        let p256dh_owned = p256dh.to_string();
        let auth_owned = auth.to_string();
        trace!(
            user_id = %uid,
            endpoint = %endpoint_owned,
            "upsert_push_subscription starting"
        );
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            let new_row = NewPushSubscription {
                user_id: &uid,
                endpoint: &endpoint_owned,
                p256dh: &p256dh_owned,
                auth: &auth_owned,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(ps::push_subscriptions)
                .values(&new_row)
                .on_conflict(ps::endpoint)
                .do_update()
                .set((
                    ps::user_id.eq(&uid),
                    ps::p256dh.eq(&p256dh_owned),
                    ps::auth.eq(&auth_owned),
                    ps::updated_at.eq(now),
                    ps::last_error.eq::<Option<String>>(None::<String>),
                    ps::last_success_at.eq::<Option<NaiveDateTime>>(None::<NaiveDateTime>),
                ))
                .execute(conn)?;
            Ok(ps::push_subscriptions
                .filter(ps::endpoint.eq(&endpoint_owned))
                .first::<PushSubscription>(conn)?)
        })
        .await
    }

    pub async fn list_push_subscriptions_for_user(
        &self,
        uid: &str,
    ) -> Result<Vec<PushSubscription>, StorageError> {
        use schema::push_subscriptions::dsl as ps;
        let uid = uid.to_string();
        self.run(move |conn| {
            Ok(ps::push_subscriptions
                .filter(ps::user_id.eq(&uid))
                .order(ps::created_at.asc())
                .load::<PushSubscription>(conn)?)
        })
        .await
    }

    pub async fn delete_push_subscription(
        &self,
        uid: &str,
        endpoint: &str,
    ) -> Result<bool, StorageError> {
        use schema::push_subscriptions::dsl as ps;
        let uid = uid.to_string();
        let endpoint_owned = endpoint.to_string();
        self.run(move |conn| {
            let deleted = diesel::delete(
                ps::push_subscriptions
                    .filter(ps::user_id.eq(&uid))
                    .filter(ps::endpoint.eq(&endpoint_owned)),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    pub async fn mark_push_delivery_result(
        &self,
        subscription_id: i32,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        use schema::push_subscriptions::dsl as ps;
        let error_owned = error.map(|s| s.to_string());
        self.run(move |conn| {
            let now = Utc::now().naive_utc();
            if success {
                diesel::update(ps::push_subscriptions.filter(ps::id.eq(subscription_id)))
                    .set((
                        ps::updated_at.eq(now),
                        ps::last_success_at.eq(Some(now)),
                        ps::last_error.eq::<Option<String>>(None::<String>),
                    ))
                    .execute(conn)?;
            } else {
                diesel::update(ps::push_subscriptions.filter(ps::id.eq(subscription_id)))
                    .set((
                        ps::updated_at.eq(now),
                        ps::last_error.eq(error_owned.as_deref()),
                    ))
                    .execute(conn)?;
            }
            Ok(())
        })
        .await
    }
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    // Ignore the result rows; Diesel's execute is fine for PRAGMAs
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON;").execute(conn)?;
    Ok(())
}
