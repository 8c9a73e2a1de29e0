use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn v1(base: &str, suffix: &str) -> String {
    base_join(base, &format!("{}/{}", API_V1_PREFIX, suffix))
}

pub fn version(base: &str) -> String {
    v1(base, "version")
}

pub fn auth_signup(base: &str) -> String {
    v1(base, "auth/signup")
}
pub fn auth_login(base: &str) -> String {
    v1(base, "auth/login")
}
pub fn auth_refresh(base: &str) -> String {
    v1(base, "auth/refresh")
}

pub fn users(base: &str) -> String {
    v1(base, "users")
}
pub fn user_performance(base: &str, user_id: &str) -> String {
    v1(base, &format!("users/{}/performance", enc(user_id)))
}
pub fn user_qr(base: &str, user_id: &str) -> String {
    v1(base, &format!("users/{}/qr", enc(user_id)))
}
pub fn user_qr_scans(base: &str, user_id: &str) -> String {
    v1(base, &format!("users/{}/qr/scans", enc(user_id)))
}
pub fn user_attendance(base: &str, user_id: &str) -> String {
    v1(base, &format!("users/{}/attendance", enc(user_id)))
}

pub fn tasks(base: &str) -> String {
    v1(base, "tasks")
}
pub fn task(base: &str, task_id: i32) -> String {
    v1(base, &format!("tasks/{}", task_id))
}
pub fn task_start(base: &str, task_id: i32) -> String {
    v1(base, &format!("tasks/{}/start", task_id))
}
pub fn task_submit_report(base: &str, task_id: i32) -> String {
    v1(base, &format!("tasks/{}/submit-report", task_id))
}
pub fn task_approve(base: &str, task_id: i32) -> String {
    v1(base, &format!("tasks/{}/approve", task_id))
}
pub fn task_reject(base: &str, task_id: i32) -> String {
    v1(base, &format!("tasks/{}/reject", task_id))
}

pub fn pending_approvals(base: &str) -> String {
    v1(base, "admin/pending-approvals")
}
pub fn performance_metrics(base: &str) -> String {
    v1(base, "admin/performance-metrics")
}
pub fn performance_metrics_rebuild(base: &str) -> String {
    v1(base, "admin/performance-metrics/rebuild")
}
pub fn admin_qr_scans(base: &str) -> String {
    v1(base, "admin/qr-scans")
}

pub fn qr_scan(base: &str) -> String {
    v1(base, "qr/scan")
}

pub fn notifications(base: &str) -> String {
    v1(base, "notifications")
}
pub fn notifications_count(base: &str) -> String {
    v1(base, "notifications/count")
}
pub fn notification_read(base: &str, notification_id: i32) -> String {
    v1(base, &format!("notifications/{}/read", notification_id))
}

pub fn push_subscribe(base: &str) -> String {
    v1(base, "push/subscriptions")
}
pub fn push_unsubscribe(base: &str) -> String {
    v1(base, "push/subscriptions/unsubscribe")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_double_slashes() {
        assert_eq!(tasks("http://h:1/"), "http://h:1/api/v1/tasks");
        assert_eq!(
            task_approve("http://h:1", 7),
            "http://h:1/api/v1/tasks/7/approve"
        );
    }

    #[test]
    fn user_segments_are_percent_encoded() {
        assert_eq!(
            user_qr("", "a/b c"),
            "/api/v1/users/a%2Fb%20c/qr"
        );
    }
}
