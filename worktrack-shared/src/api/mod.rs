use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::{ApprovalStatus, AttendanceAction, TaskStatus};

pub mod endpoints;

pub const API_V1_PREFIX: &str = "/api/v1";

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionDto {
    pub version: String,
}

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupReq {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResp {
    pub ok: bool,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResp {
    pub ok: bool,
    pub user: UserDto,
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshReq {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResp {
    pub ok: bool,
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

// Tasks
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskReq {
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResp {
    pub ok: bool,
    pub task_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDto {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub approval_status: ApprovalStatus,
    pub daily_report: Option<String>,
    pub hours_spent: f64,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<String>, // RFC3339 UTC
    pub admin_feedback: Option<String>,
    pub approved_at: Option<String>, // RFC3339 UTC
    pub created_at: String,          // RFC3339 UTC
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingApprovalDto {
    #[serde(flatten)]
    pub task: TaskDto,
    pub submitted_by_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitReportReq {
    pub daily_report: String,
    /// The worker's own view of the task: still in progress or done.
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub hours_spent: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReviewReq {
    pub feedback: Option<String>,
}

/// Acknowledgement for start/submit/approve/reject.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkflowAck {
    pub ok: bool,
    pub task_id: i32,
    pub status: TaskStatus,
    pub approval_status: ApprovalStatus,
}

// Performance metrics
#[derive(Debug, Serialize, Deserialize)]
pub struct PerformanceMetricsDto {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub tasks_completed: i32,
    pub tasks_assigned: i32,
    pub total_hours_worked: f64,
    pub completion_rate: i32,
    pub last_updated: Option<String>, // RFC3339 UTC; None when derived on the fly
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PerformanceBreakdownDto {
    pub tasks_completed: i32,
    pub tasks_submitted_pending: i32,
    pub tasks_in_progress: i32,
    pub tasks_assigned: i32,
    pub total_hours_worked: f64,
    pub completion_rate: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmployeePerformanceDto {
    pub ok: bool,
    pub user: UserDto,
    pub performance: PerformanceBreakdownDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RebuildMetricsResp {
    pub ok: bool,
    pub rebuilt: usize,
}

// QR credentials
#[derive(Debug, Serialize, Deserialize)]
pub struct QrCredentialDto {
    pub ok: bool,
    pub user_id: String,
    pub qr_token: String,
    pub qr_payload: String,
    /// PNG image as a `data:` URL.
    pub qr_image: String,
    pub is_activated: bool,
    pub generated_at: String,
    pub first_scan_at: Option<String>,
    pub scan_count: i32,
}

/// Either the raw `(user_id, qr_token)` pair or the signed `payload` read
/// from the QR image.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScanReq {
    pub user_id: Option<String>,
    pub qr_token: Option<String>,
    pub payload: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResp {
    pub ok: bool,
    pub user_id: String,
    pub scanned_at: String,
    pub scan_count: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrCredentialSummaryDto {
    pub generated_at: String,
    pub is_activated: bool,
    pub first_scan_at: Option<String>,
    pub scan_count: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrScanDto {
    pub id: i32,
    pub scanned_at: String,
    pub scanner_ip: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserQrScansResp {
    pub ok: bool,
    pub credential: Option<QrCredentialSummaryDto>,
    pub scans: Vec<QrScanDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrScanRecordDto {
    pub id: i32,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub scanned_at: String,
    pub scanner_ip: String,
    pub qr_activated: bool,
    pub total_scans: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrScanRecordsResp {
    pub ok: bool,
    pub records: Vec<QrScanRecordDto>,
}

// Attendance
#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceReq {
    pub action: AttendanceAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceResp {
    pub ok: bool,
    pub id: i32,
    pub recorded_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceDto {
    pub id: i32,
    pub action: AttendanceAction,
    pub recorded_at: String,
}

// Notifications
/// Event delivered to notification sinks (inbox, push, email).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    TaskSubmitted {
        task_id: i32,
        title: String,
        worker_id: String,
        worker_name: String,
        report: String,
        reported_status: Option<TaskStatus>,
        hours_spent: f64,
    },
    TaskApproved {
        task_id: i32,
        title: String,
        feedback: String,
    },
    TaskRejected {
        task_id: i32,
        title: String,
        feedback: String,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::TaskSubmitted { .. } => "task_submitted",
            NotificationEvent::TaskApproved { .. } => "task_approved",
            NotificationEvent::TaskRejected { .. } => "task_rejected",
        }
    }

    pub fn task_id(&self) -> i32 {
        match self {
            NotificationEvent::TaskSubmitted { task_id, .. }
            | NotificationEvent::TaskApproved { task_id, .. }
            | NotificationEvent::TaskRejected { task_id, .. } => *task_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationDto {
    pub id: i32,
    pub kind: String,
    pub event: NotificationEvent,
    pub created_at: String,
    pub read: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationCountDto {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushSubscribeReq {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushUnsubscribeReq {
    pub endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResp {
    pub ok: bool,
}
