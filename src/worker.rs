use super::{
    model::{TaskEvent, WorkerId, WorkerState},
    pool::Shared,
    priority::Priority,
    queue::TaskQueue,
    task::Task,
};
use std::{
    io,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

/// A persistent thread pulling tasks from the shared queue.
pub(crate) struct Worker {
    id: WorkerId,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        id: WorkerId,
        builder: thread::Builder,
        queue: Arc<TaskQueue<Task>>,
        shared: Arc<Shared>,
        priority: Priority,
    ) -> io::Result<Self> {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let thread_state = state.clone();

        shared.worker_started();
        let spawned = {
            let shared = shared.clone();
            builder.spawn(move || {
                let _exit = ExitGuard {
                    shared: shared.clone(),
                    state: thread_state.clone(),
                };
                priority.apply_to_current_thread();
                worker_loop(id, &queue, &shared);
                thread_state.store(STOPPING, Ordering::Release);
            })
        };

        match spawned {
            Ok(thread) => Ok(Self {
                id,
                state,
                thread: Some(thread),
            }),
            Err(e) => {
                shared.worker_exited();
                Err(e)
            }
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    #[inline]
    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Hands out the join handle unless it belongs to the calling thread,
    /// which cannot join itself.
    pub(crate) fn take_thread(&mut self) -> Option<JoinHandle<()>> {
        match &self.thread {
            Some(t) if t.thread().id() == thread::current().id() => None,
            _ => self.thread.take(),
        }
    }
}

struct ExitGuard {
    shared: Arc<Shared>,
    state: Arc<AtomicU8>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.state.store(STOPPED, Ordering::Release);
        self.shared.worker_exited();
    }
}

fn worker_loop(id: WorkerId, queue: &TaskQueue<Task>, shared: &Shared) {
    tracing::debug!(worker = id, "worker started");

    loop {
        shared.idle_workers.fetch_add(1, Ordering::Relaxed);
        let next = queue.dequeue();
        shared.idle_workers.fetch_sub(1, Ordering::Relaxed);

        let Some(task) = next else {
            break;
        };

        if shared.abort_requested() {
            shared.abandon(task);
            continue;
        }

        execute(id, task, shared);
    }

    tracing::debug!(worker = id, "worker stopping");
}

fn execute(worker: WorkerId, task: Task, shared: &Shared) {
    let task_id = task.id();
    let detached = task.is_detached();

    shared.active_tasks.fetch_add(1, Ordering::Relaxed);
    shared.emit(&TaskEvent::Started { task: task_id, worker });
    tracing::trace!(worker, task = %task_id, "task started");

    let start = Instant::now();
    match task.run() {
        Ok(()) => {
            shared.completed_tasks.fetch_add(1, Ordering::Relaxed);
            shared.emit(&TaskEvent::Finished {
                task: task_id,
                worker,
                elapsed: start.elapsed(),
            });
            tracing::trace!(worker, task = %task_id, "task finished");
        }
        Err(message) => {
            shared.failed_tasks.fetch_add(1, Ordering::Relaxed);
            if detached {
                tracing::error!(worker, task = %task_id, %message, "detached task panicked");
            } else {
                tracing::warn!(worker, task = %task_id, %message, "task panicked");
            }
            shared.emit(&TaskEvent::Failed {
                task: task_id,
                worker,
                message,
            });
        }
    }

    shared.active_tasks.fetch_sub(1, Ordering::Relaxed);
    shared.task_done();
}
