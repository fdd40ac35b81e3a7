//! In-memory registry of background pipeline runs.

use dashmap::DashMap;
use extract::{CancellationToken, PipelineKind, PipelineReport, RunStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Finished tasks kept for status queries before the oldest are dropped.
pub const DEFAULT_MAX_FINISHED: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl From<RunStatus> for TaskStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Completed => Self::Completed,
            RunStatus::Cancelled => Self::Cancelled,
            RunStatus::Failed => Self::Failed,
        }
    }
}

struct TaskEntry {
    pipeline: PipelineKind,
    status: TaskStatus,
    logs: Vec<String>,
    result: Option<PipelineReport>,
    error: Option<String>,
    cancel: CancellationToken,
    /// Finish order, for eviction
    finished_seq: Option<u64>,
}

/// What `GET /task_status` returns.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task_id: Uuid,
    pub pipeline: PipelineKind,
    pub status: TaskStatus,
    pub logs: Vec<String>,
    pub result: Option<PipelineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TaskRegistry {
    tasks: DashMap<Uuid, TaskEntry>,
    max_finished: usize,
    finished_count: AtomicU64,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::with_max_finished(DEFAULT_MAX_FINISHED)
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running tasks are never evicted; only finished ones count toward the cap.
    pub fn with_max_finished(max_finished: usize) -> Self {
        Self {
            tasks: DashMap::new(),
            max_finished,
            finished_count: AtomicU64::new(0),
        }
    }

    /// Register a running task and hand back its id and cancellation token.
    pub fn create(&self, pipeline: PipelineKind) -> (Uuid, CancellationToken) {
        let task_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.tasks.insert(
            task_id,
            TaskEntry {
                pipeline,
                status: TaskStatus::Running,
                logs: Vec::new(),
                result: None,
                error: None,
                cancel: cancel.clone(),
                finished_seq: None,
            },
        );
        (task_id, cancel)
    }

    pub fn append_log(&self, task_id: Uuid, line: String) {
        if let Some(mut entry) = self.tasks.get_mut(&task_id) {
            entry.logs.push(line);
        }
    }

    /// Record how a run ended. Only completed runs keep a result.
    pub fn finish(&self, task_id: Uuid, outcome: extract::Result<PipelineReport>) {
        {
            let Some(mut entry) = self.tasks.get_mut(&task_id) else {
                return;
            };
            entry.status = RunStatus::from_result(&outcome).into();
            entry.finished_seq = Some(self.finished_count.fetch_add(1, Ordering::Relaxed));
            match outcome {
                Ok(report) => entry.result = Some(report),
                Err(e) => entry.error = Some(e.to_string()),
            }
        }
        self.evict_finished();
    }

    /// Drop the oldest finished tasks beyond the cap.
    fn evict_finished(&self) {
        let mut finished: Vec<(u64, Uuid)> = self
            .tasks
            .iter()
            .filter_map(|entry| entry.finished_seq.map(|seq| (seq, *entry.key())))
            .collect();
        if finished.len() <= self.max_finished {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.max_finished;
        for (_, task_id) in finished.into_iter().take(excess) {
            self.tasks.remove(&task_id);
        }
        tracing::debug!(evicted = excess, "finished tasks evicted");
    }

    /// Request cancellation. Returns false for unknown tasks.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        match self.tasks.get(&task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn view(&self, task_id: Uuid) -> Option<TaskView> {
        self.tasks.get(&task_id).map(|entry| TaskView {
            task_id,
            pipeline: entry.pipeline,
            status: entry.status,
            logs: entry.logs.clone(),
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::ExtractError;

    #[test]
    fn test_new_task_is_running() {
        let registry = TaskRegistry::new();
        let (id, token) = registry.create(PipelineKind::Grammar);

        let view = registry.view(id).unwrap();
        assert_eq!(view.status, TaskStatus::Running);
        assert_eq!(view.pipeline, PipelineKind::Grammar);
        assert!(view.result.is_none());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_trips_the_token() {
        let registry = TaskRegistry::new();
        let (id, token) = registry.create(PipelineKind::Consistency);

        assert!(registry.cancel(id));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[test]
    fn test_finish_maps_outcomes() {
        let registry = TaskRegistry::new();
        let (done, _) = registry.create(PipelineKind::Grammar);
        let (cancelled, _) = registry.create(PipelineKind::Consistency);
        let (failed, _) = registry.create(PipelineKind::Correction);

        registry.finish(done, Ok(PipelineReport::Grammar { results: Vec::new() }));
        registry.finish(cancelled, Err(ExtractError::Cancelled));
        registry.finish(failed, Err(ExtractError::Validation("bad".into())));

        let done = registry.view(done).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.result.is_some());

        let cancelled = registry.view(cancelled).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.result.is_none());

        let failed = registry.view(failed).unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.error.is_some());
    }

    #[test]
    fn test_oldest_finished_tasks_are_evicted() {
        let registry = TaskRegistry::with_max_finished(2);
        let (running, _) = registry.create(PipelineKind::Consistency);
        let ids: Vec<Uuid> = (0..3)
            .map(|_| {
                let (id, _) = registry.create(PipelineKind::Grammar);
                registry.finish(id, Ok(PipelineReport::Grammar { results: Vec::new() }));
                id
            })
            .collect();

        assert_eq!(registry.len(), 3);
        assert!(registry.view(ids[0]).is_none());
        assert!(registry.view(ids[1]).is_some());
        assert!(registry.view(ids[2]).is_some());
        assert_eq!(registry.view(running).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn test_logs_are_kept_in_order() {
        let registry = TaskRegistry::new();
        let (id, _) = registry.create(PipelineKind::Consistency);
        registry.append_log(id, "chunk 1/2".into());
        registry.append_log(id, "chunk 2/2".into());

        assert_eq!(registry.view(id).unwrap().logs, vec!["chunk 1/2", "chunk 2/2"]);
    }
}
