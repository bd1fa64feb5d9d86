// src/tasks.rs
//! Background task tracking for the acquire/transform operations.
//!
//! Callers get an opaque [`TaskId`] back immediately and poll [`TaskRegistry::status`]
//! until the task reaches `Success` or `Failed`.
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::edgar::client::AcquireConfig;
use crate::edgar::models::DatasetId;
use crate::pipeline::{self, TransformConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    Failed,
    NotFound,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    name: &'static str,
    status: TaskStatus,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` in the background; its boolean result becomes Success/Failed.
    pub async fn spawn<F>(&self, name: &'static str, work: F) -> TaskId
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tasks.write().await.insert(
            id,
            TaskRecord {
                name,
                status: TaskStatus::Running,
            },
        );
        tracing::info!("Started {} as {}", name, id);

        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            // A panicking task must not stay Running forever.
            let ok = tokio::spawn(work).await.unwrap_or(false);
            let status = if ok { TaskStatus::Success } else { TaskStatus::Failed };
            if let Some(record) = tasks.write().await.get_mut(&id) {
                record.status = status;
                tracing::info!("{} ({}) finished: {:?}", id, record.name, status);
            }
        });
        id
    }

    pub fn spawn_acquire(
        &self,
        config: AcquireConfig,
        dataset: DatasetId,
    ) -> impl Future<Output = TaskId> + '_ {
        self.spawn("acquire", pipeline::acquire(config, dataset))
    }

    pub fn spawn_transform(
        &self,
        config: TransformConfig,
        dataset: DatasetId,
    ) -> impl Future<Output = TaskId> + '_ {
        self.spawn("transform", async move {
            match pipeline::transform(&config, dataset).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::error!("Transform of {} failed: {}", dataset, e);
                    false
                }
            }
        })
    }

    pub async fn status(&self, id: TaskId) -> TaskStatus {
        self.tasks
            .read()
            .await
            .get(&id)
            .map(|record| record.status)
            .unwrap_or(TaskStatus::NotFound)
    }

    /// Polls every `interval` until the task is no longer running.
    pub async fn wait(&self, id: TaskId, interval: Duration) -> TaskStatus {
        loop {
            match self.status(id).await {
                TaskStatus::Running => tokio::time::sleep(interval).await,
                done => return done,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_task_status_lifecycle() {
        let registry = TaskRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let id = registry
            .spawn("gated", async move { rx.await.is_ok() })
            .await;
        assert_eq!(registry.status(id).await, TaskStatus::Running);

        tx.send(()).unwrap();
        assert_eq!(registry.wait(id, POLL).await, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_and_panicking_tasks() {
        let registry = TaskRegistry::new();
        let failed = registry.spawn("fails", async { false }).await;
        let panicked = registry
            .spawn("panics", async {
                let results: Vec<bool> = Vec::new();
                results[0]
            })
            .await;

        assert_ne!(failed, panicked);
        assert_eq!(registry.wait(failed, POLL).await, TaskStatus::Failed);
        assert_eq!(registry.wait(panicked, POLL).await, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let registry = TaskRegistry::new();
        assert_eq!(registry.status(TaskId(99)).await, TaskStatus::NotFound);
    }

    #[tokio::test]
    async fn test_transform_task_reports_failure_for_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaskRegistry::new();
        let config = TransformConfig {
            data_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            dispatcher: Default::default(),
        };
        let id = registry.spawn_transform(config, DatasetId::new(2022, 1)).await;
        assert_eq!(registry.wait(id, POLL).await, TaskStatus::Failed);
    }
}
