use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};
use parking_lot::{Condvar, Mutex};

struct Slot<T> {
    outcome: Option<SpawnResult<T>>,
    wakers: Vec<Waker>,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    /// Panics if the slot is already set: a second write means the pool lost
    /// track of which task owns this handle.
    fn set(&self, outcome: SpawnResult<T>) {
        let mut slot = self.slot.lock();
        if slot.outcome.is_some() {
            drop(slot);
            panic!("result handle completed twice");
        }
        slot.outcome = Some(outcome);
        let wakers = std::mem::take(&mut slot.wakers);
        drop(slot);

        self.ready.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Creates an unset handle and the single writer allowed to set it.
pub fn pair<T>() -> (ResultHandle<T>, Completer<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot {
            outcome: None,
            wakers: Vec::new(),
        }),
        ready: Condvar::new(),
    });
    (
        ResultHandle { shared: shared.clone() },
        Completer { shared: Some(shared) },
    )
}

/// Write side of a [`ResultHandle`].
///
/// Dropping it without calling [`complete`](Self::complete) resolves the
/// handle to [`SpawnError::Shutdown`], so readers are never left waiting on a
/// task that will not run.
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {
    pub fn complete(mut self, outcome: SpawnResult<T>) {
        if let Some(shared) = self.shared.take() {
            shared.set(outcome);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.set(Err(SpawnError::Shutdown));
        }
    }
}

/// Single-assignment result of a submitted computation.
///
/// Clones share the same slot. Every reader, blocking or async, observes the
/// same outcome once the task has run.
pub struct ResultHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("is_set", &self.is_set())
            .finish()
    }
}

impl<T> ResultHandle<T> {
    #[inline]
    pub fn is_set(&self) -> bool {
        self.shared.slot.lock().outcome.is_some()
    }
}

impl<T: Clone> ResultHandle<T> {
    /// Blocks the calling thread until the task has produced its outcome.
    pub fn get(&self) -> SpawnResult<T> {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return outcome.clone();
            }
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Like [`get`](Self::get) but gives up with [`SpawnError::Timeout`]
    /// after `timeout`. The handle can still be read later. A timeout too
    /// large to represent as a deadline waits like `get`.
    pub fn get_timeout(&self, timeout: Duration) -> SpawnResult<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get();
        };
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome.as_ref() {
                return outcome.clone();
            }
            if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.outcome.clone().unwrap_or(Err(SpawnError::Timeout));
            }
        }
    }

    #[inline]
    pub fn try_get(&self) -> Option<SpawnResult<T>> {
        self.shared.slot.lock().outcome.clone()
    }

    pub async fn await_timeout(&self, timeout: Duration) -> SpawnResult<T> {
        match tokio::time::timeout(timeout, self.clone()).await {
            Ok(result) => result,
            Err(_) => Err(SpawnError::Timeout),
        }
    }
}

impl<T: Clone> Future for ResultHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.slot.lock();
        if let Some(outcome) = slot.outcome.as_ref() {
            return Poll::Ready(outcome.clone());
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Awaits every handle, returning outcomes in the order of `handles`.
pub async fn join_all<T: Clone>(handles: Vec<ResultHandle<T>>) -> Vec<SpawnResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }
    futures::future::join_all(handles).await
}
