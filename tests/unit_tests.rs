#[cfg(test)]
mod tests {
    use async_tasks::{
        errors::{PoolError, SpawnError},
        handle::join_all,
        model::{TaskEvent, TaskId, WorkerState},
        pool::{Config, ShutdownPolicy, ThreadPool},
        priority::Priority,
    };
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Arc, Mutex,
        },
        thread,
        time::Duration,
    };

    /// Occupies the single worker of `pool` until the returned sender fires.
    fn block_worker(pool: &ThreadPool) -> mpsc::Sender<()> {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        pool.execute(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        release_tx
    }

    fn recording_hook() -> (Arc<Mutex<Vec<TaskEvent>>>, Config) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let config = Config::new(1).with_event_hook(move |event| {
            sink.lock().unwrap().push(event.clone());
        });
        (events, config)
    }

    #[test]
    fn test_submit_returns_values() {
        println!("\n=== TEST: submit + get ===");
        let pool = ThreadPool::new(2, Priority::Default).unwrap();

        let int = pool.submit(|| 40 + 2).unwrap();
        let text = pool.submit(|| format!("result_{}", 7)).unwrap();
        let unit = pool.submit(|| ()).unwrap();

        assert_eq!(text.get(), Ok("result_7".to_string()));
        assert_eq!(int.get(), Ok(42));
        assert_eq!(int.get(), Ok(42), "repeated get returns the same value");
        assert_eq!(unit.get(), Ok(()));
        pool.shutdown();
    }

    #[test]
    fn test_panicking_callable_reports_failure() {
        println!("\n=== TEST: panic inside a callable ===");
        let pool = ThreadPool::new(1, Priority::Default).unwrap();

        let failed = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
        assert_eq!(failed.get(), Err(SpawnError::Panic("boom".into())));

        let ok = pool.submit(|| 1u32).unwrap();
        assert_eq!(ok.get(), Ok(1), "worker must survive the panic");

        pool.wait_idle();
        let metrics = pool.metrics();
        assert_eq!(metrics.failed_tasks, 1);
        assert_eq!(metrics.completed_tasks, 1);
    }

    #[test]
    fn test_panicking_runnable_reaches_event_hook() {
        println!("\n=== TEST: panic inside a runnable ===");
        let (events, config) = recording_hook();
        let pool = ThreadPool::with_config(config).unwrap();

        let id = pool.execute(|| panic!("detached failure")).unwrap();
        pool.wait_idle();

        let failures: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Failed { task, message, .. } => Some((*task, message.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec![(id, "detached failure".to_string())]);

        let after = pool.submit(|| "still alive").unwrap();
        assert_eq!(after.get(), Ok("still alive"));
    }

    #[test]
    fn test_event_sequence() {
        let (events, config) = recording_hook();
        let pool = ThreadPool::with_config(config).unwrap();

        let handle = pool.submit(|| 3).unwrap();
        assert_eq!(handle.get(), Ok(3));
        pool.wait_idle();

        let events = events.lock().unwrap().clone();
        assert!(events.contains(&TaskEvent::Enqueued { task: TaskId(0) }));
        assert!(events.contains(&TaskEvent::Started { task: TaskId(0), worker: 0 }));
        assert!(events
            .iter()
            .any(|e| matches!(e, TaskEvent::Finished { task: TaskId(0), worker: 0, .. })));
    }

    #[test]
    fn test_panicking_hook_is_contained() {
        let config = Config::new(1).with_event_hook(|_| panic!("hook failure"));
        let pool = ThreadPool::with_config(config).unwrap();

        let handle = pool.submit(|| 9).unwrap();
        assert_eq!(handle.get(), Ok(9));
        pool.shutdown();
    }

    #[test]
    fn test_fifo_single_worker() {
        println!("\n=== TEST: FIFO on a single worker ===");
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let order = order.clone();
            pool.execute(move || order.lock().unwrap().push(i)).unwrap();
        }
        pool.wait_idle();

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_rejected_after_shutdown() {
        println!("\n=== TEST: submissions after shutdown ===");
        let (events, config) = recording_hook();
        let pool = ThreadPool::with_config(config).unwrap();
        pool.shutdown_now();

        assert!(pool.is_shutdown());
        assert_eq!(pool.execute(|| {}), Err(SpawnError::Rejected));
        assert_eq!(pool.submit(|| 1).unwrap_err(), SpawnError::Rejected);
        assert_eq!(pool.try_submit(|| 1).unwrap_err(), SpawnError::Rejected);
        assert_eq!(pool.metrics().rejected_tasks, 3);
        assert_eq!(
            events.lock().unwrap().iter().filter(|e| **e == TaskEvent::Rejected).count(),
            3
        );
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = ThreadPool::new(3, Priority::Default).unwrap();
        pool.shutdown_now();
        pool.shutdown_now();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.shutdown_timeout(Duration::from_millis(10)));

        let states = pool.worker_states();
        assert_eq!(states.len(), 3);
        assert!(states.iter().all(|(_, s)| *s == WorkerState::Stopped));
    }

    #[test]
    fn test_drain_runs_queued_tasks() {
        println!("\n=== TEST: drain on shutdown ===");
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let release = block_worker(&pool);

        let handles: Vec<_> = (1..=3).map(|i| pool.submit(move || i * 10).unwrap()).collect();
        pool.shutdown_now();
        assert_eq!(pool.queued(), 3);

        release.send(()).unwrap();
        let results: Vec<_> = handles.iter().map(|h| h.get()).collect();
        assert_eq!(results, vec![Ok(10), Ok(20), Ok(30)]);
        pool.shutdown();
        assert_eq!(pool.metrics().abandoned_tasks, 0);
    }

    #[test]
    fn test_abort_releases_blocked_getters() {
        println!("\n=== TEST: abort releases blocked get() ===");
        let (events, config) = recording_hook();
        let pool = ThreadPool::with_config(config.with_shutdown_policy(ShutdownPolicy::Abort)).unwrap();
        let release = block_worker(&pool);

        let never_runs = pool.submit(|| 5).unwrap();
        let never_runs_id = TaskId(1);
        let (result_tx, result_rx) = mpsc::channel();
        let reader = {
            let handle = never_runs.clone();
            thread::spawn(move || result_tx.send(handle.get()).unwrap())
        };

        thread::sleep(Duration::from_millis(50));
        pool.shutdown_now();

        let released = result_rx.recv_timeout(Duration::from_secs(1));
        assert_eq!(released, Ok(Err(SpawnError::Shutdown)));
        assert_eq!(never_runs.get(), Err(SpawnError::Shutdown));
        reader.join().unwrap();

        release.send(()).unwrap();
        pool.shutdown();
        assert_eq!(pool.metrics().abandoned_tasks, 1);

        let events = events.lock().unwrap();
        assert!(events.contains(&TaskEvent::Abandoned { task: never_runs_id }));
        assert!(!events.contains(&TaskEvent::Started { task: never_runs_id, worker: 0 }));
    }

    #[test]
    fn test_abort_never_runs_and_abandons_the_same_task() {
        println!("\n=== TEST: abort under load ===");
        let ran = Arc::new(Mutex::new(Vec::new()));
        let abandoned = Arc::new(Mutex::new(Vec::new()));
        let config = {
            let ran = ran.clone();
            let abandoned = abandoned.clone();
            Config::new(4)
                .with_shutdown_policy(ShutdownPolicy::Abort)
                .with_event_hook(move |event| match event {
                    TaskEvent::Started { task, .. } => ran.lock().unwrap().push(*task),
                    TaskEvent::Abandoned { task } => abandoned.lock().unwrap().push(*task),
                    _ => {}
                })
        };
        let pool = ThreadPool::with_config(config).unwrap();

        for _ in 0..20_000 {
            pool.execute(|| {}).unwrap();
        }
        pool.shutdown_now();
        assert!(pool.cancellation_token().is_cancelled());
        pool.shutdown();

        let ran = ran.lock().unwrap();
        let abandoned = abandoned.lock().unwrap();
        assert_eq!(ran.len() + abandoned.len(), 20_000);
        let ran_ids: HashSet<_> = ran.iter().copied().collect();
        assert_eq!(ran_ids.len(), ran.len());
        assert!(abandoned.iter().all(|id| !ran_ids.contains(id)));
        let metrics = pool.metrics();
        assert_eq!(metrics.completed_tasks + metrics.abandoned_tasks, 20_000);
    }

    #[test]
    fn test_zero_threads_is_error() {
        match ThreadPool::new(0, Priority::Default) {
            Err(PoolError::InvalidConfig(_)) => {}
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_drains_and_joins() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(2, Priority::Background).unwrap();
            for _ in 0..100 {
                let counter = counter.clone();
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_last_reference_dropped_inside_task() {
        let pool = Arc::new(ThreadPool::new(2, Priority::Default).unwrap());
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let inner = pool.clone();
        pool.execute(move || {
            let _ = go_rx.recv();
            drop(inner);
            done_tx.send(()).unwrap();
        })
        .unwrap();

        drop(pool);
        go_tx.send(()).unwrap();
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_bounded_queue_try_submit() {
        println!("\n=== TEST: bounded queue ===");
        let pool = ThreadPool::with_config(Config::new(1).with_max_pending(1)).unwrap();
        let release = block_worker(&pool);

        let queued = pool.try_submit(|| 1).unwrap();
        assert_eq!(pool.try_submit(|| 2).unwrap_err(), SpawnError::QueueFull);
        assert_eq!(pool.try_execute(|| {}), Err(SpawnError::QueueFull));

        release.send(()).unwrap();
        assert_eq!(queued.get(), Ok(1));
    }

    #[test]
    fn test_blocked_producer_released_by_shutdown() {
        let pool = Arc::new(ThreadPool::with_config(Config::new(1).with_max_pending(1)).unwrap());
        let release = block_worker(&pool);
        pool.execute(|| {}).unwrap();

        let producer = {
            let pool = pool.clone();
            thread::spawn(move || pool.execute(|| {}))
        };
        thread::sleep(Duration::from_millis(50));
        pool.shutdown_now();

        assert_eq!(producer.join().unwrap(), Err(SpawnError::Rejected));
        release.send(()).unwrap();
        pool.shutdown();
    }

    #[test]
    fn test_get_timeout_on_slow_task() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let slow = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(300));
                1
            })
            .unwrap();
        assert_eq!(slow.get_timeout(Duration::from_millis(20)), Err(SpawnError::Timeout));
        assert_eq!(slow.get(), Ok(1));
    }

    #[test]
    fn test_wait_idle_timeout() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let release = block_worker(&pool);
        assert!(!pool.wait_idle_timeout(Duration::from_millis(20)));
        release.send(()).unwrap();
        assert!(pool.wait_idle_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_unbounded_timeouts_do_not_overflow() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let handle = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(20));
                4
            })
            .unwrap();
        assert_eq!(handle.get_timeout(Duration::MAX), Ok(4));
        assert!(pool.wait_idle_timeout(Duration::MAX));
        assert!(pool.shutdown_timeout(Duration::MAX));
        assert!(pool.worker_states().iter().all(|(_, s)| *s == WorkerState::Stopped));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_background_priority_reaches_worker_threads() {
        let pool = ThreadPool::new(1, Priority::Background).unwrap();
        let nice = pool
            .submit(|| unsafe { libc::getpriority(libc::PRIO_PROCESS, 0) })
            .unwrap()
            .get()
            .unwrap();
        assert_eq!(nice, Priority::Background.nice());
        assert_eq!(nice, 10);
    }

    #[test]
    fn test_shutdown_timeout_with_busy_worker() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let release = block_worker(&pool);
        assert!(!pool.shutdown_timeout(Duration::from_millis(20)));
        release.send(()).unwrap();
        assert!(pool.shutdown_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_config_presets() {
        let cpus = num_cpus::get();
        assert_eq!(Config::cpu_bound().num_threads, cpus);
        assert_eq!(Config::io_bound().num_threads, cpus * 2);
        assert_eq!(Config::default().shutdown_policy, ShutdownPolicy::Drain);

        let pool = ThreadPool::with_config(
            Config::new(2)
                .with_thread_name_prefix("unit")
                .with_stack_size(256 * 1024),
        )
        .unwrap();
        let name = pool
            .submit(|| thread::current().name().map(str::to_string))
            .unwrap()
            .get()
            .unwrap();
        assert!(name.unwrap().starts_with("unit-"));
    }

    #[tokio::test]
    async fn test_await_handle() {
        let pool = ThreadPool::new(2, Priority::Default).unwrap();
        let handle = pool.submit(|| "async").unwrap();
        assert_eq!(handle.await, Ok("async"));
    }

    #[tokio::test]
    async fn test_join_all_keeps_submission_order() {
        let pool = ThreadPool::new(4, Priority::Default).unwrap();
        let handles: Vec<_> = (0..20u64)
            .map(|i| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(20 - i));
                    i
                })
                .unwrap()
            })
            .collect();

        let results = join_all(handles).await;
        assert_eq!(results, (0..20u64).map(Ok).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_await_timeout() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let slow = pool
            .submit(|| {
                thread::sleep(Duration::from_millis(300));
                1
            })
            .unwrap();
        assert_eq!(slow.await_timeout(Duration::from_millis(20)).await, Err(SpawnError::Timeout));
        assert_eq!(slow.await_timeout(Duration::from_secs(5)).await, Ok(1));
    }

    #[tokio::test]
    async fn test_cancellation_token_fires_on_shutdown() {
        let pool = ThreadPool::new(1, Priority::Default).unwrap();
        let token = pool.cancellation_token();
        assert!(!token.is_cancelled());

        pool.shutdown_now();
        let fired = tokio::time::timeout(Duration::from_secs(1), token.cancelled()).await;
        assert!(fired.is_ok());
    }
}
