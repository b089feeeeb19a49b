use super::{
    errors::{PoolError, SpawnError},
    handle::ResultHandle,
    model::{EventHook, PoolMetrics, TaskEvent, TaskId, WorkerState},
    priority::Priority,
    queue::TaskQueue,
    result::SpawnResult,
    task::Task,
    worker::Worker,
};
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;


/// What happens to tasks still queued when the pool shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Queued tasks still run; workers stop once the queue is empty.
    #[default]
    Drain,
    /// Queued tasks are dropped; their handles resolve to
    /// [`SpawnError::Shutdown`].
    Abort,
}

/// Pool configuration
#[derive(Clone)]
pub struct Config {
    pub num_threads: usize,
    pub priority: Priority,
    /// Capacity of the task queue. `None` means unbounded.
    pub max_pending: Option<usize>,
    pub shutdown_policy: ShutdownPolicy,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub event_hook: Option<EventHook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            priority: Priority::Default,
            max_pending: None,
            shutdown_policy: ShutdownPolicy::Drain,
            thread_name_prefix: "async-tasks".to_string(),
            stack_size: None,
            event_hook: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("num_threads", &self.num_threads)
            .field("priority", &self.priority)
            .field("max_pending", &self.max_pending)
            .field("shutdown_policy", &self.shutdown_policy)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field("event_hook", &self.event_hook.is_some())
            .finish()
    }
}

impl Config {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    pub fn cpu_bound() -> Self {
        Self {
            num_threads: num_cpus::get(),
            priority: Priority::UserInitiated,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2,
            priority: Priority::Utility,
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = Some(max_pending);
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn with_event_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.event_hook = Some(Arc::new(hook));
        self
    }
}


/// State shared by the pool handle and every worker thread.
pub(crate) struct Shared {
    pub(crate) active_tasks: CachePadded<AtomicUsize>,
    pub(crate) idle_workers: CachePadded<AtomicUsize>,
    pub(crate) completed_tasks: CachePadded<AtomicUsize>,
    pub(crate) failed_tasks: CachePadded<AtomicUsize>,
    total_submitted: CachePadded<AtomicUsize>,
    rejected_tasks: AtomicUsize,
    abandoned_tasks: AtomicUsize,
    // Accepted tasks not yet finished or abandoned.
    pending: Mutex<usize>,
    all_done: Condvar,
    live_workers: Mutex<usize>,
    all_stopped: Condvar,
    cancellation_token: CancellationToken,
    policy: ShutdownPolicy,
    event_hook: Option<EventHook>,
}

impl Shared {
    fn new(policy: ShutdownPolicy, event_hook: Option<EventHook>) -> Self {
        Self {
            active_tasks: CachePadded::new(AtomicUsize::new(0)),
            idle_workers: CachePadded::new(AtomicUsize::new(0)),
            completed_tasks: CachePadded::new(AtomicUsize::new(0)),
            failed_tasks: CachePadded::new(AtomicUsize::new(0)),
            total_submitted: CachePadded::new(AtomicUsize::new(0)),
            rejected_tasks: AtomicUsize::new(0),
            abandoned_tasks: AtomicUsize::new(0),
            pending: Mutex::new(0),
            all_done: Condvar::new(),
            live_workers: Mutex::new(0),
            all_stopped: Condvar::new(),
            cancellation_token: CancellationToken::new(),
            policy,
            event_hook,
        }
    }

    pub(crate) fn emit(&self, event: &TaskEvent) {
        if let Some(hook) = &self.event_hook {
            if catch_unwind(AssertUnwindSafe(|| hook(event))).is_err() {
                tracing::error!(?event, "event hook panicked");
            }
        }
    }

    #[inline]
    pub(crate) fn abort_requested(&self) -> bool {
        self.policy == ShutdownPolicy::Abort && self.cancellation_token.is_cancelled()
    }

    fn task_accepted(&self) {
        *self.pending.lock() += 1;
    }

    pub(crate) fn task_done(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.all_done.notify_all();
        }
    }

    /// Drops a task that will never run. Its handle, if any, resolves to
    /// [`SpawnError::Shutdown`] before the task stops counting as pending.
    pub(crate) fn abandon(&self, task: Task) {
        let id = task.id();
        drop(task);
        self.abandoned_tasks.fetch_add(1, Ordering::Relaxed);
        self.emit(&TaskEvent::Abandoned { task: id });
        tracing::debug!(task = %id, "task abandoned by shutdown");
        self.task_done();
    }

    pub(crate) fn worker_started(&self) {
        *self.live_workers.lock() += 1;
    }

    pub(crate) fn worker_exited(&self) {
        let mut live = self.live_workers.lock();
        *live -= 1;
        if *live == 0 {
            self.all_stopped.notify_all();
        }
    }

    fn wait_workers_stopped(&self, deadline: Instant) -> bool {
        let mut live = self.live_workers.lock();
        while *live > 0 {
            if self.all_stopped.wait_until(&mut live, deadline).timed_out() {
                return *live == 0;
            }
        }
        true
    }
}


/// Fixed-size pool of worker threads fed from one FIFO queue.
///
/// Tasks are dequeued in submission order. With more than one worker they
/// may finish in any order. Dropping the pool shuts it down and joins its
/// workers.
pub struct ThreadPool {
    queue: Arc<TaskQueue<Task>>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<Worker>>,
    next_id: AtomicU64,
    config: Config,
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.config)
            .field("queued", &self.queue.size())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl ThreadPool {
    pub fn new(num_threads: usize, priority: Priority) -> Result<Self, PoolError> {
        Self::with_config(Config::new(num_threads).with_priority(priority))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        if config.num_threads == 0 {
            return Err(PoolError::config("need at least 1 worker thread"));
        }

        let queue = Arc::new(TaskQueue::with_capacity(config.max_pending));
        let shared = Arc::new(Shared::new(
            config.shutdown_policy,
            config.event_hook.clone(),
        ));

        let pool = ThreadPool {
            queue,
            shared,
            workers: Mutex::new(Vec::with_capacity(config.num_threads)),
            next_id: AtomicU64::new(0),
            config,
        };

        for id in 0..pool.config.num_threads {
            let mut builder = thread::Builder::new()
                .name(format!("{}-{}", pool.config.thread_name_prefix, id));
            if let Some(size) = pool.config.stack_size {
                builder = builder.stack_size(size);
            }

            // On error the partially built pool is dropped, which stops and
            // joins the workers already running.
            let worker = Worker::spawn(
                id,
                builder,
                pool.queue.clone(),
                pool.shared.clone(),
                pool.config.priority,
            )?;
            pool.workers.lock().push(worker);
        }

        tracing::debug!(
            num_threads = pool.config.num_threads,
            priority = ?pool.config.priority,
            max_pending = ?pool.config.max_pending,
            "thread pool started"
        );
        Ok(pool)
    }

    #[inline]
    fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn push_task(&self, task: Task, wait_for_room: bool) -> SpawnResult<TaskId> {
        let id = task.id();
        self.shared.task_accepted();

        let pushed = if wait_for_room {
            self.queue.enqueue(task)
        } else {
            self.queue.try_enqueue(task)
        };

        match pushed {
            Ok(()) => {
                self.shared.total_submitted.fetch_add(1, Ordering::Relaxed);
                self.shared.emit(&TaskEvent::Enqueued { task: id });
                Ok(id)
            }
            Err(task) => {
                drop(task);
                self.shared.task_done();
                if self.queue.is_shutdown() {
                    self.shared.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                    self.shared.emit(&TaskEvent::Rejected);
                    tracing::debug!("submission rejected after shutdown");
                    Err(SpawnError::Rejected)
                } else {
                    Err(SpawnError::QueueFull)
                }
            }
        }
    }

    /// Queues a fire-and-forget task. Waits for room if the queue is bounded
    /// and full.
    ///
    /// A panic inside `f` is logged, counted and reported to the event hook;
    /// it never reaches the caller.
    pub fn execute<F>(&self, f: F) -> SpawnResult<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_task(Task::runnable(self.next_task_id(), f), true)
    }

    pub fn try_execute<F>(&self, f: F) -> SpawnResult<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.push_task(Task::runnable(self.next_task_id(), f), false)
    }

    /// Queues a computation and returns the handle its outcome will be
    /// written to.
    pub fn submit<T, F>(&self, f: F) -> SpawnResult<ResultHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (task, handle) = Task::callable(self.next_task_id(), f);
        self.push_task(task, true)?;
        Ok(handle)
    }

    pub fn try_submit<T, F>(&self, f: F) -> SpawnResult<ResultHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (task, handle) = Task::callable(self.next_task_id(), f);
        self.push_task(task, false)?;
        Ok(handle)
    }

    /// Stops accepting work and tells the workers to stop. Does not wait.
    ///
    /// Tasks already running are never interrupted. What happens to queued
    /// tasks depends on [`ShutdownPolicy`]. Calling this more than once has
    /// no further effect.
    pub fn shutdown_now(&self) {
        // Cancel first: a worker that sees the closed queue must also see the
        // abort flag.
        self.shared.cancellation_token.cancel();
        if !self.queue.shutdown() {
            return;
        }
        tracing::info!(policy = ?self.config.shutdown_policy, queued = self.queue.size(), "shutting down thread pool");

        if self.config.shutdown_policy == ShutdownPolicy::Abort {
            for task in self.queue.drain() {
                self.shared.abandon(task);
            }
        }
    }

    /// [`shutdown_now`](Self::shutdown_now), then joins every worker.
    pub fn shutdown(&self) {
        self.shutdown_now();
        self.join_workers();
    }

    /// [`shutdown_now`](Self::shutdown_now), then waits up to `timeout` for
    /// the workers to stop. Returns `false` if some are still busy.
    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        self.shutdown_now();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.join_workers();
            return true;
        };
        if !self.shared.wait_workers_stopped(deadline) {
            return false;
        }
        self.join_workers();
        true
    }

    fn join_workers(&self) {
        let threads: Vec<_> = self
            .workers
            .lock()
            .iter_mut()
            .filter_map(Worker::take_thread)
            .collect();

        for thread in threads {
            if thread.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
    }

    /// Blocks until every accepted task has finished or been abandoned.
    pub fn wait_idle(&self) {
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.all_done.wait(&mut pending);
        }
    }

    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_idle();
            return true;
        };
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            if self.shared.all_done.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.queue.is_shutdown()
    }

    /// Token cancelled when the pool shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancellation_token.clone()
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    /// Advisory count of tasks waiting in the queue.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.size()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn worker_states(&self) -> Vec<(usize, WorkerState)> {
        self.workers
            .lock()
            .iter()
            .map(|w| (w.id(), w.state()))
            .collect()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            active_tasks: self.shared.active_tasks.load(Ordering::Relaxed),
            idle_workers: self.shared.idle_workers.load(Ordering::Relaxed),
            queued_tasks: self.queue.size(),
            total_submitted: self.shared.total_submitted.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.shared.rejected_tasks.load(Ordering::Relaxed),
            abandoned_tasks: self.shared.abandoned_tasks.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown_now();
        self.join_workers();
    }
}
