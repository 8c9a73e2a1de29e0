//! Task approval workflow.
//!
//! ```text
//! pending --start--> in-progress
//! pending | in-progress --submit--> submitted
//! submitted --approve--> completed
//! submitted --reject--> in-progress
//! ```
//!
//! Every transition is a compare-and-swap on the stored status, so of two
//! concurrent transitions out of the same state exactly one wins.

use chrono::Utc;
use tracing::{error, info, warn};
use worktrack_shared::api::NotificationEvent;
use worktrack_shared::auth::Role;
use worktrack_shared::domain::{ApprovalStatus, TaskStatus};

use crate::error::CoreError;
use crate::metrics::MetricsAggregator;
use crate::notify::{Dispatcher, Recipient};
use crate::storage::models::{Task, User};
use crate::storage::{CasOutcome, Store, TaskPatch};

pub const DEFAULT_APPROVAL_FEEDBACK: &str = "Approved";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Start,
    Submit,
    Approve,
    Reject,
}

impl TaskEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::Start => "start",
            TaskEvent::Submit => "submit",
            TaskEvent::Approve => "approve",
            TaskEvent::Reject => "reject",
        }
    }

    /// States the event may fire from.
    pub fn sources(&self) -> &'static [TaskStatus] {
        match self {
            TaskEvent::Start => &[TaskStatus::Pending],
            TaskEvent::Submit => &[TaskStatus::Pending, TaskStatus::InProgress],
            TaskEvent::Approve | TaskEvent::Reject => &[TaskStatus::Submitted],
        }
    }

    pub fn target(&self) -> TaskStatus {
        match self {
            TaskEvent::Start => TaskStatus::InProgress,
            TaskEvent::Submit => TaskStatus::Submitted,
            TaskEvent::Approve => TaskStatus::Completed,
            TaskEvent::Reject => TaskStatus::InProgress,
        }
    }
}

/// The state `event` leads to from `from`, or `None` if not allowed.
pub fn next_status(from: TaskStatus, event: TaskEvent) -> Option<TaskStatus> {
    event.sources().contains(&from).then(|| event.target())
}

/// A worker's daily report.
#[derive(Debug, Clone)]
pub struct Submission {
    pub report: String,
    /// The worker's own view: still in progress or done.
    pub reported_status: Option<TaskStatus>,
    pub hours_spent: f64,
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Store,
    metrics: MetricsAggregator,
    notifier: Dispatcher,
}

impl WorkflowEngine {
    pub fn new(store: Store, metrics: MetricsAggregator, notifier: Dispatcher) -> Self {
        Self {
            store,
            metrics,
            notifier,
        }
    }

    /// Creates a task assigned to an existing worker.
    pub async fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
        assigned_to: &str,
    ) -> Result<Task, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title is required"));
        }
        let Some(assignee) = self.store.get_user(assigned_to).await? else {
            return Err(CoreError::validation(format!(
                "assigned_to does not name a user: {}",
                assigned_to
            )));
        };
        if assignee.role()? != Role::Worker {
            return Err(CoreError::validation("tasks can only be assigned to workers"));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let task = self
            .store
            .create_task(title, description, &assignee.id)
            .await?;
        info!(task_id = task.id, assigned_to = %assignee.id, "workflow: task created");
        self.recompute_after_commit(&assignee.id, 0.0).await;
        Ok(task)
    }

    pub async fn start(&self, task_id: i32, actor: &User) -> Result<Task, CoreError> {
        self.ensure_assignee(task_id, actor).await?;
        let patch = TaskPatch::status(TaskStatus::InProgress);
        self.transition(task_id, TaskEvent::Start, patch).await
    }

    /// Records the worker's report and moves the task to `submitted`.
    pub async fn submit_report(
        &self,
        task_id: i32,
        actor: &User,
        submission: Submission,
    ) -> Result<Task, CoreError> {
        let report = submission.report.trim();
        if report.is_empty() {
            return Err(CoreError::validation("daily report content is required"));
        }
        let hours = submission.hours_spent;
        if !hours.is_finite() || hours < 0.0 {
            return Err(CoreError::validation("hours_spent must be a non-negative number"));
        }
        if let Some(s) = submission.reported_status
            && !matches!(s, TaskStatus::InProgress | TaskStatus::Completed)
        {
            return Err(CoreError::validation(
                "status must be either in-progress or completed",
            ));
        }
        self.ensure_assignee(task_id, actor).await?;

        let now = Utc::now().naive_utc();
        let patch = TaskPatch {
            approval_status: Some(ApprovalStatus::Pending),
            daily_report: Some(report.to_string()),
            add_hours: Some(hours),
            submitted_by: Some(actor.id.clone()),
            submitted_at: Some(now),
            ..TaskPatch::status(TaskStatus::Submitted)
        };
        let task = self.transition(task_id, TaskEvent::Submit, patch).await?;

        self.recompute_after_commit(&actor.id, hours).await;

        match self.store.list_users_by_role(Role::Admin).await {
            Ok(admins) => self.notifier.dispatch(
                admins.iter().map(Recipient::from).collect(),
                NotificationEvent::TaskSubmitted {
                    task_id: task.id,
                    title: task.title.clone(),
                    worker_id: actor.id.clone(),
                    worker_name: actor.name.clone(),
                    report: report.to_string(),
                    reported_status: submission.reported_status,
                    hours_spent: hours,
                },
            ),
            Err(e) => warn!(task_id, error = %e, "workflow: admin lookup for notification failed"),
        }
        Ok(task)
    }

    /// Approves a submitted task. Empty feedback becomes "Approved".
    pub async fn approve(&self, task_id: i32, feedback: Option<&str>) -> Result<Task, CoreError> {
        let feedback = feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_APPROVAL_FEEDBACK)
            .to_string();
        let patch = TaskPatch {
            approval_status: Some(ApprovalStatus::Approved),
            admin_feedback: Some(feedback.clone()),
            approved_at: Some(Utc::now().naive_utc()),
            ..TaskPatch::status(TaskStatus::Completed)
        };
        let task = self.transition(task_id, TaskEvent::Approve, patch).await?;

        if let Some(uid) = metrics_owner(&task) {
            self.recompute_after_commit(uid, 0.0).await;
        }
        self.notify_submitter(
            &task,
            NotificationEvent::TaskApproved {
                task_id: task.id,
                title: task.title.clone(),
                feedback,
            },
        )
        .await;
        Ok(task)
    }

    /// Sends a submitted task back to `in-progress`. Feedback is required.
    pub async fn reject(&self, task_id: i32, feedback: &str) -> Result<Task, CoreError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(CoreError::validation("feedback is required for rejection"));
        }
        let patch = TaskPatch {
            approval_status: Some(ApprovalStatus::Rejected),
            admin_feedback: Some(feedback.to_string()),
            ..TaskPatch::status(TaskStatus::InProgress)
        };
        let task = self.transition(task_id, TaskEvent::Reject, patch).await?;
        self.notify_submitter(
            &task,
            NotificationEvent::TaskRejected {
                task_id: task.id,
                title: task.title.clone(),
                feedback: feedback.to_string(),
            },
        )
        .await;
        Ok(task)
    }

    async fn transition(
        &self,
        task_id: i32,
        event: TaskEvent,
        patch: TaskPatch,
    ) -> Result<Task, CoreError> {
        match self
            .store
            .cas_update_task(task_id, event.sources(), patch)
            .await?
        {
            CasOutcome::Updated(task) => {
                info!(
                    task_id,
                    event = event.as_str(),
                    status = %task.status,
                    "workflow: transition applied"
                );
                Ok(task)
            }
            CasOutcome::NotFound => Err(CoreError::not_found(format!(
                "task not found: {}",
                task_id
            ))),
            CasOutcome::Conflict { actual } => {
                warn!(
                    task_id,
                    event = event.as_str(),
                    actual = %actual,
                    "workflow: transition rejected"
                );
                Err(CoreError::InvalidStateTransition {
                    action: event.as_str(),
                    actual,
                })
            }
        }
    }

    async fn ensure_assignee(&self, task_id: i32, actor: &User) -> Result<(), CoreError> {
        let Some(task) = self.store.get_task(task_id).await? else {
            return Err(CoreError::not_found(format!("task not found: {}", task_id)));
        };
        if task.assigned_to.as_deref() != Some(actor.id.as_str()) {
            warn!(task_id, user_id = %actor.id, "workflow: actor is not the assignee");
            return Err(CoreError::Forbidden);
        }
        Ok(())
    }

    // The transition is already committed; a failed recompute is repaired
    // by the next recompute or an explicit rebuild.
    async fn recompute_after_commit(&self, user_id: &str, delta_hours: f64) {
        if let Err(e) = self.metrics.recompute(user_id, delta_hours).await {
            error!(user_id, error = %e, "workflow: metrics recompute failed");
        }
    }

    async fn notify_submitter(&self, task: &Task, event: NotificationEvent) {
        let Some(uid) = task.submitted_by.as_deref() else {
            return;
        };
        match self.store.get_user(uid).await {
            Ok(Some(user)) => self.notifier.dispatch(vec![Recipient::from(&user)], event),
            Ok(None) => warn!(task_id = task.id, user_id = uid, "workflow: submitter missing"),
            Err(e) => warn!(task_id = task.id, error = %e, "workflow: submitter lookup failed"),
        }
    }
}

fn metrics_owner(task: &Task) -> Option<&str> {
    task.submitted_by.as_deref().or(task.assigned_to.as_deref())
}
