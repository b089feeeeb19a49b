use std::{
    fmt,
    sync::Arc,
    time::Duration,
};

/// Pool-unique id assigned to every accepted task, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

pub type WorkerId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopping,
    Stopped,
}

impl WorkerState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Running,
            1 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Lifecycle notifications delivered to the pool's event hook.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Enqueued { task: TaskId },
    Started { task: TaskId, worker: WorkerId },
    Finished { task: TaskId, worker: WorkerId, elapsed: Duration },
    Failed { task: TaskId, worker: WorkerId, message: String },
    /// A submission arrived after shutdown.
    Rejected,
    /// An accepted task was dropped by an abort shutdown without running.
    Abandoned { task: TaskId },
}

pub type EventHook = Arc<dyn Fn(&TaskEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub total_submitted: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub rejected_tasks: usize,
    pub abandoned_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.active_tasks + self.idle_workers == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / (self.active_tasks + self.idle_workers) as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}
