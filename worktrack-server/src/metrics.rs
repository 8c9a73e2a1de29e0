use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use worktrack_shared::domain::{ApprovalStatus, TaskStatus};

use crate::error::CoreError;
use crate::storage::Store;
use crate::storage::models::{PerformanceMetrics, Task, User};

type UserLockMap = Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>;

/// `round(100 * completed / assigned)`, or 0 when nothing is assigned.
pub fn completion_rate(completed: i32, assigned: i32) -> i32 {
    if assigned <= 0 {
        return 0;
    }
    (f64::from(completed) * 100.0 / f64::from(assigned)).round() as i32
}

fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// A worker's metrics row. `stored` is false when the row was derived on
/// the fly because none has been persisted yet.
#[derive(Debug, Clone)]
pub struct MetricsView {
    pub user: User,
    pub metrics: PerformanceMetrics,
    pub stored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceBreakdown {
    pub tasks_completed: i32,
    pub tasks_submitted_pending: i32,
    pub tasks_in_progress: i32,
    pub tasks_assigned: i32,
    pub total_hours_worked: f64,
    pub completion_rate: i32,
}

struct Counts {
    completed: i32,
    assigned: i32,
    hours: f64,
}

fn count(tasks: &[Task]) -> Result<Counts, CoreError> {
    let mut completed = 0;
    for t in tasks {
        if t.approval_status()? == ApprovalStatus::Approved {
            completed += 1;
        }
    }
    Ok(Counts {
        completed,
        assigned: tasks.len() as i32,
        hours: tasks.iter().map(|t| t.hours_spent).sum(),
    })
}

#[derive(Clone)]
pub struct MetricsAggregator {
    store: Store,
    locks: UserLockMap,
}

impl MetricsAggregator {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            locks: Default::default(),
        }
    }

    async fn user_mutex(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().await;
        map.entry(user_id.to_string())
            .or_insert_with(Default::default)
            .clone()
    }

    /// Re-derives the user's counts from their tasks. Hours add `delta_hours`
    /// to the stored total, or sum every task when no row exists yet.
    pub async fn recompute(
        &self,
        user_id: &str,
        delta_hours: f64,
    ) -> Result<PerformanceMetrics, CoreError> {
        let mutex = self.user_mutex(user_id).await;
        let _guard = mutex.lock().await;

        let tasks = self.store.list_tasks_for_user(user_id).await?;
        let counts = count(&tasks)?;
        let total_hours = match self.store.get_metrics(user_id).await? {
            Some(existing) => existing.total_hours_worked + delta_hours,
            None => counts.hours,
        };
        let metrics = self.persist(user_id, &counts, total_hours).await?;
        debug!(
            user_id,
            completed = metrics.tasks_completed,
            assigned = metrics.tasks_assigned,
            rate = metrics.completion_rate,
            "metrics: recomputed"
        );
        Ok(metrics)
    }

    /// Recomputes every field, hours included, from the task store.
    pub async fn rebuild(&self, user_id: &str) -> Result<PerformanceMetrics, CoreError> {
        let mutex = self.user_mutex(user_id).await;
        let _guard = mutex.lock().await;

        let tasks = self.store.list_tasks_for_user(user_id).await?;
        let counts = count(&tasks)?;
        self.persist(user_id, &counts, counts.hours).await
    }

    /// Rebuilds every worker's metrics. Returns how many rows were written.
    pub async fn rebuild_all(&self) -> Result<usize, CoreError> {
        let workers = self.store.list_workers().await?;
        for w in &workers {
            self.rebuild(&w.id).await?;
        }
        info!(workers = workers.len(), "metrics: rebuilt all");
        Ok(workers.len())
    }

    async fn persist(
        &self,
        user_id: &str,
        counts: &Counts,
        total_hours: f64,
    ) -> Result<PerformanceMetrics, CoreError> {
        let row = PerformanceMetrics {
            user_id: user_id.to_string(),
            tasks_completed: counts.completed,
            tasks_assigned: counts.assigned,
            total_hours_worked: total_hours.max(0.0),
            completion_rate: completion_rate(counts.completed, counts.assigned),
            last_updated: Utc::now().naive_utc(),
        };
        Ok(self.store.upsert_metrics(row).await?)
    }

    /// Metrics for every worker, best completion rate first. Workers without
    /// a stored row are derived from their tasks without being persisted.
    pub async fn all_metrics(&self) -> Result<Vec<MetricsView>, CoreError> {
        let mut views: Vec<MetricsView> = self
            .store
            .list_metrics()
            .await?
            .into_iter()
            .map(|(metrics, user)| MetricsView {
                user,
                metrics,
                stored: true,
            })
            .collect();

        let seen: HashSet<String> = views.iter().map(|v| v.user.id.clone()).collect();
        for worker in self.store.list_workers().await? {
            if seen.contains(&worker.id) {
                continue;
            }
            let tasks = self.store.list_tasks_for_user(&worker.id).await?;
            let counts = count(&tasks)?;
            views.push(MetricsView {
                metrics: PerformanceMetrics {
                    user_id: worker.id.clone(),
                    tasks_completed: counts.completed,
                    tasks_assigned: counts.assigned,
                    total_hours_worked: counts.hours,
                    completion_rate: completion_rate(counts.completed, counts.assigned),
                    last_updated: Utc::now().naive_utc(),
                },
                user: worker,
                stored: false,
            });
        }

        views.sort_by(|a, b| {
            b.metrics
                .completion_rate
                .cmp(&a.metrics.completion_rate)
                .then_with(|| a.user.name.cmp(&b.user.name))
        });
        Ok(views)
    }

    /// Per-status breakdown of one user's tasks, hours rounded to 2 decimals.
    pub async fn employee_performance(
        &self,
        user_id: &str,
    ) -> Result<(User, PerformanceBreakdown), CoreError> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Err(CoreError::not_found(format!("user not found: {}", user_id)));
        };
        let tasks = self.store.list_tasks_for_user(user_id).await?;
        let mut completed = 0;
        let mut submitted = 0;
        let mut in_progress = 0;
        for t in &tasks {
            match t.status()? {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Submitted => submitted += 1,
                TaskStatus::InProgress => in_progress += 1,
                TaskStatus::Pending => {}
            }
        }
        let assigned = tasks.len() as i32;
        let hours: f64 = tasks.iter().map(|t| t.hours_spent).sum();
        Ok((
            user,
            PerformanceBreakdown {
                tasks_completed: completed,
                tasks_submitted_pending: submitted,
                tasks_in_progress: in_progress,
                tasks_assigned: assigned,
                total_hours_worked: round_hours(hours),
                completion_rate: completion_rate(completed, assigned),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_rounds_to_nearest() {
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(1, 2), 50);
        assert_eq!(completion_rate(3, 3), 100);
    }

    #[test]
    fn completion_rate_is_zero_without_assignments() {
        assert_eq!(completion_rate(0, 0), 0);
    }

    #[test]
    fn hours_round_to_two_decimals() {
        assert_eq!(round_hours(3.14159), 3.14);
        assert_eq!(round_hours(0.1 + 0.2), 0.3);
    }
}
