//! Fixed-size thread pool executing closures from a shared FIFO queue.
//!
//! # Features
//! - Fire-and-forget tasks ([`ThreadPool::execute`]) and value-producing tasks
//!   ([`ThreadPool::submit`]) whose outcome lands in a [`ResultHandle`]
//! - Workers and callers sleep on condition variables, never spin
//! - Panics in tasks are caught and reported, workers survive them
//! - Drain or abort shutdown; blocked readers are always released
//! - Per-thread priority hints, bounded queues, metrics and an event hook
//!
//! ```
//! use async_tasks::{ThreadPool, Priority};
//!
//! let pool = ThreadPool::new(2, Priority::Default).unwrap();
//! let handle = pool.submit(|| 6 * 7).unwrap();
//! assert_eq!(handle.get(), Ok(42));
//! pool.shutdown();
//! ```

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod priority;
pub mod queue;
pub mod result;
mod task;
mod worker;

pub use errors::{PoolError, SpawnError};
pub use handle::ResultHandle;
pub use model::{PoolMetrics, TaskEvent, TaskId, WorkerState};
pub use pool::{Config, ShutdownPolicy, ThreadPool};
pub use priority::Priority;
pub use queue::TaskQueue;
pub use result::SpawnResult;
