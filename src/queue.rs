use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Blocking FIFO shared between producers and the worker threads.
///
/// Every read and write of the items and of the closed flag happens under one
/// mutex. Consumers sleep on `not_empty` while the queue is empty, producers
/// sleep on `not_full` while a bounded queue is at capacity. `shutdown` wakes
/// everybody; consumers keep receiving items until the queue is drained and
/// only then observe `None`.
pub struct TaskQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> TaskQueue<T> {
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    pub(crate) fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    #[inline]
    fn is_full(&self, state: &State<T>) -> bool {
        matches!(self.capacity, Some(cap) if state.items.len() >= cap)
    }

    /// Appends `item` at the tail, waiting for room if the queue is bounded
    /// and full. The item is handed back if the queue is shut down.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        while !state.closed && self.is_full(&state) {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Like [`enqueue`](Self::enqueue) but never waits for room.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed || self.is_full(&state) {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head item, sleeping while the queue is empty.
    ///
    /// Returns `None` once the queue has been shut down and every item queued
    /// before that has been handed out.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                if self.capacity.is_some() {
                    self.not_full.notify_one();
                }
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Advisory snapshot; may be stale as soon as it returns.
    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().closed
    }

    /// Closes the queue. Returns `true` for the call that actually closed it.
    pub fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    /// Takes every queued item out, in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let items: Vec<T> = state.items.drain(..).collect();
        drop(state);
        self.not_full.notify_all();
        items
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
