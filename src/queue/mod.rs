use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Bounded FIFO submission queue with a non-blocking producer side.
///
/// Producers never wait: [`JobQueue::try_push`] either accepts the item or
/// hands it back. A consumer parked in [`JobQueue::pop`] takes an item
/// directly, outside the buffer, so a queue of capacity 0 behaves as a
/// rendezvous point: a push succeeds only while a consumer is waiting.
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Consumers currently parked in `pop`.
    waiting: usize,
    closed: bool,
}

/// Rejected push; the item is handed back to the caller.
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> JobQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                waiting: 0,
                closed: false,
            }),
            available: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of consumers currently parked waiting for an item.
    pub fn parked_consumers(&self) -> usize {
        self.lock().waiting
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(PushError::Closed(item));
            }
            // Without a buffer, a parked consumer stands in for one slot.
            let limit = if self.capacity == 0 {
                state.waiting.min(1)
            } else {
                self.capacity
            };
            if state.items.len() >= limit {
                return Err(PushError::Full(item));
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting for one if the queue is empty.
    ///
    /// Returns `None` once the queue is closed and fully drained. Items
    /// accepted before `close` are still returned.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.available.notified();
            let _parked = {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
                state.waiting += 1;
                Parked { queue: self }
            };
            notified.await;
        }
    }

    /// Refuse further pushes and wake every parked consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the parked-consumer count right even when a `pop` future is dropped.
struct Parked<'a, T> {
    queue: &'a JobQueue<T>,
}

impl<T> Drop for Parked<'_, T> {
    fn drop(&mut self) {
        let mut state = self.queue.lock();
        state.waiting = state.waiting.saturating_sub(1);
    }
}
