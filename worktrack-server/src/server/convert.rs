use chrono::{DateTime, NaiveDateTime, Utc};
use worktrack_shared::api;

use super::AppError;
use crate::metrics::{MetricsView, PerformanceBreakdown};
use crate::storage::models::{Attendance, Notification, QrCredential, QrScanRecord, Task, User};

pub(super) fn rfc3339(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(super) fn user_dto(u: &User) -> Result<api::UserDto, AppError> {
    Ok(api::UserDto {
        id: u.id.clone(),
        name: u.name.clone(),
        email: u.email.clone(),
        role: u.role().map_err(AppError::internal)?,
    })
}

pub(super) fn task_dto(t: &Task) -> Result<api::TaskDto, AppError> {
    Ok(api::TaskDto {
        id: t.id,
        title: t.title.clone(),
        description: t.description.clone(),
        assigned_to: t.assigned_to.clone(),
        status: t.status().map_err(AppError::internal)?,
        approval_status: t.approval_status().map_err(AppError::internal)?,
        daily_report: t.daily_report.clone(),
        hours_spent: t.hours_spent,
        submitted_by: t.submitted_by.clone(),
        submitted_at: t.submitted_at.map(rfc3339),
        admin_feedback: t.admin_feedback.clone(),
        approved_at: t.approved_at.map(rfc3339),
        created_at: rfc3339(t.created_at),
    })
}

pub(super) fn workflow_ack(t: &Task) -> Result<api::WorkflowAck, AppError> {
    Ok(api::WorkflowAck {
        ok: true,
        task_id: t.id,
        status: t.status().map_err(AppError::internal)?,
        approval_status: t.approval_status().map_err(AppError::internal)?,
    })
}

pub(super) fn metrics_dto(v: &MetricsView) -> api::PerformanceMetricsDto {
    api::PerformanceMetricsDto {
        user_id: v.user.id.clone(),
        name: v.user.name.clone(),
        email: v.user.email.clone(),
        tasks_completed: v.metrics.tasks_completed,
        tasks_assigned: v.metrics.tasks_assigned,
        total_hours_worked: v.metrics.total_hours_worked,
        completion_rate: v.metrics.completion_rate,
        last_updated: v.stored.then(|| rfc3339(v.metrics.last_updated)),
    }
}

pub(super) fn breakdown_dto(b: &PerformanceBreakdown) -> api::PerformanceBreakdownDto {
    api::PerformanceBreakdownDto {
        tasks_completed: b.tasks_completed,
        tasks_submitted_pending: b.tasks_submitted_pending,
        tasks_in_progress: b.tasks_in_progress,
        tasks_assigned: b.tasks_assigned,
        total_hours_worked: b.total_hours_worked,
        completion_rate: b.completion_rate,
    }
}

pub(super) fn credential_dto(c: &QrCredential) -> api::QrCredentialDto {
    api::QrCredentialDto {
        ok: true,
        user_id: c.user_id.clone(),
        qr_token: c.qr_token.clone(),
        qr_payload: c.qr_payload.clone(),
        qr_image: c.qr_image.clone(),
        is_activated: c.is_activated,
        generated_at: rfc3339(c.generated_at),
        first_scan_at: c.first_scan_at.map(rfc3339),
        scan_count: c.scan_count,
    }
}

pub(super) fn credential_summary(c: &QrCredential) -> api::QrCredentialSummaryDto {
    api::QrCredentialSummaryDto {
        generated_at: rfc3339(c.generated_at),
        is_activated: c.is_activated,
        first_scan_at: c.first_scan_at.map(rfc3339),
        scan_count: c.scan_count,
    }
}

pub(super) fn scan_record_dto(r: &QrScanRecord) -> api::QrScanRecordDto {
    api::QrScanRecordDto {
        id: r.scan.id,
        user_id: r.scan.user_id.clone(),
        user_name: r.user_name.clone(),
        user_email: r.user_email.clone(),
        scanned_at: rfc3339(r.scan.scanned_at),
        scanner_ip: r.scan.scanner_ip.clone(),
        qr_activated: r.is_activated,
        total_scans: r.scan_count,
    }
}

pub(super) fn attendance_dto(a: &Attendance) -> Result<api::AttendanceDto, AppError> {
    Ok(api::AttendanceDto {
        id: a.id,
        action: a.action().map_err(AppError::internal)?,
        recorded_at: rfc3339(a.recorded_at),
    })
}

pub(super) fn notification_dto(n: &Notification) -> Result<api::NotificationDto, AppError> {
    Ok(api::NotificationDto {
        id: n.id,
        kind: n.kind.clone(),
        event: serde_json::from_str(&n.payload).map_err(AppError::internal)?,
        created_at: rfc3339(n.created_at),
        read: n.read_at.is_some(),
    })
}
