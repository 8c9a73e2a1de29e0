use crate::storage::schema::{
    attendance, notifications, performance_metrics, push_subscriptions, qr_credentials, qr_scans,
    tasks, users,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use worktrack_shared::auth::Role;
use worktrack_shared::domain::{ApprovalStatus, AttendanceAction, TaskStatus};

use super::StorageError;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> Result<Role, StorageError> {
        Ok(self.role.parse()?)
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = tasks)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: String,
    pub approval_status: String,
    pub daily_report: Option<String>,
    pub hours_spent: f64,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    pub admin_feedback: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn status(&self) -> Result<TaskStatus, StorageError> {
        Ok(self.status.parse()?)
    }

    pub fn approval_status(&self) -> Result<ApprovalStatus, StorageError> {
        Ok(self.approval_status.parse()?)
    }
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub assigned_to: &'a str,
    pub status: &'a str,
    pub approval_status: &'a str,
    pub hours_spent: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column updates applied by a successful compare-and-swap. `None` leaves
/// the column untouched.
#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
pub(crate) struct TaskChanges<'a> {
    pub status: &'a str,
    pub approval_status: Option<&'a str>,
    pub daily_report: Option<&'a str>,
    pub submitted_by: Option<&'a str>,
    pub submitted_at: Option<NaiveDateTime>,
    pub admin_feedback: Option<&'a str>,
    pub approved_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = qr_credentials)]
#[diesel(primary_key(user_id))]
pub struct QrCredential {
    pub user_id: String,
    pub qr_token: String,
    pub qr_payload: String,
    pub qr_image: String,
    pub generated_at: NaiveDateTime,
    pub first_scan_at: Option<NaiveDateTime>,
    pub scan_count: i32,
    pub is_activated: bool,
}

#[derive(Insertable)]
#[diesel(table_name = qr_credentials)]
pub struct NewQrCredential<'a> {
    pub user_id: &'a str,
    pub qr_token: &'a str,
    pub qr_payload: &'a str,
    pub qr_image: &'a str,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = qr_scans)]
pub struct QrScan {
    pub id: i32,
    pub user_id: String,
    pub qr_token: String,
    pub scanned_at: NaiveDateTime,
    pub scanner_ip: String,
}

#[derive(Insertable)]
#[diesel(table_name = qr_scans)]
pub struct NewQrScan<'a> {
    pub user_id: &'a str,
    pub qr_token: &'a str,
    pub scanned_at: NaiveDateTime,
    pub scanner_ip: &'a str,
}

/// A scan joined with the scanned user and the credential's current state.
#[derive(Debug, Clone)]
pub struct QrScanRecord {
    pub scan: QrScan,
    pub user_name: String,
    pub user_email: String,
    pub is_activated: bool,
    pub scan_count: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = performance_metrics)]
#[diesel(primary_key(user_id))]
pub struct PerformanceMetrics {
    pub user_id: String,
    pub tasks_completed: i32,
    pub tasks_assigned: i32,
    pub total_hours_worked: f64,
    pub completion_rate: i32,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = attendance)]
pub struct Attendance {
    pub id: i32,
    pub user_id: String,
    pub action: String,
    pub recorded_at: NaiveDateTime,
}

impl Attendance {
    pub fn action(&self) -> Result<AttendanceAction, StorageError> {
        Ok(self.action.parse()?)
    }
}

#[derive(Insertable)]
#[diesel(table_name = attendance)]
pub struct NewAttendance<'a> {
    pub user_id: &'a str,
    pub action: &'a str,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: i32,
    pub user_id: String,
    pub kind: String,
    pub payload: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub user_id: &'a str,
    pub kind: &'a str,
    pub payload: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = push_subscriptions)]
pub struct PushSubscription {
    pub id: i32,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_success_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = push_subscriptions)]
pub struct NewPushSubscription<'a> {
    pub user_id: &'a str,
    pub endpoint: &'a str,
    pub p256dh: &'a str,
    pub auth: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
