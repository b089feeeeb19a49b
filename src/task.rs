use super::{
    errors::{panic_message, SpawnError},
    handle::{self, ResultHandle},
    model::TaskId,
};
use std::panic::{catch_unwind, AssertUnwindSafe};

type Job = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

/// A queued unit of work.
///
/// The body is wrapped so that running it never unwinds: a panic comes back
/// as `Err(message)`. Dropping a task that never ran drops the completer it
/// captured, which resolves its handle to [`SpawnError::Shutdown`].
pub(crate) struct Task {
    id: TaskId,
    detached: bool,
    job: Job,
}

impl Task {
    pub(crate) fn runnable<F>(id: TaskId, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            detached: true,
            job: Box::new(move || catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)),
        }
    }

    pub(crate) fn callable<T, F>(id: TaskId, f: F) -> (Self, ResultHandle<T>)
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (handle, completer) = handle::pair();
        let job: Job = Box::new(move || match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                completer.complete(Ok(value));
                Ok(())
            }
            Err(payload) => {
                let message = panic_message(payload);
                completer.complete(Err(SpawnError::Panic(message.clone())));
                Err(message)
            }
        });
        (Self { id, detached: false, job }, handle)
    }

    #[inline]
    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// `true` when no handle exists to receive a failure.
    #[inline]
    pub(crate) fn is_detached(&self) -> bool {
        self.detached
    }

    /// Runs the body on the current thread. `Err` carries the panic message.
    pub(crate) fn run(self) -> Result<(), String> {
        (self.job)()
    }
}
