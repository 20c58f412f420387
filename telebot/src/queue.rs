//! Bounded FIFO of raw inbound update bytes shared between the webhook
//! ingress and the processing worker pool. `push` never blocks the accept
//! loop; `pop_timeout` is the worker-side suspension point, built over
//! [`tokio::sync::Notify`] instead of a raw condvar poll.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

const DEFAULT_CAPACITY: usize = 10_000;

pub struct UpdateQueue {
    capacity: usize,
    items: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Enqueue one update's raw bytes. If the queue is already at its
    /// configured capacity, the newest arrival is dropped and logged rather
    /// than applying back-pressure to the accept loop — the webhook response
    /// is still a plain 200; the ingress never reflects queue state to the
    /// caller.
    pub fn push(&self, bytes: Vec<u8>) {
        let mut guard = self.items.lock().unwrap();
        if guard.len() >= self.capacity {
            log::warn!("update queue full at {} items, dropping newest arrival", self.capacity);
            return;
        }
        guard.push_back(bytes);
        drop(guard);
        self.notify.notify_one();
    }

    /// Wait up to `timeout` for an item to arrive, mirroring the original's
    /// 50 ms condvar poll. Registers for notification before checking the
    /// queue so a push racing with the check is never missed.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        loop {
            let notified = self.notify.notified();
            if let Some(item) = self.pop_now() {
                return Some(item);
            }
            match tokio::time::timeout(timeout, notified).await {
                Ok(()) => continue,
                Err(_) => return None,
            }
        }
    }

    fn pop_now(&self) -> Option<Vec<u8>> {
        self.items.lock().unwrap().pop_front()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}
