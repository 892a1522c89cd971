//! Per-consumer-group delivery queue.
//!
//! A bounded FIFO with an explicit overflow policy, split into a push side
//! (owned by the broadcaster task) and a pop side ([`Subscription`], owned by
//! the consumer). tokio's stock channels cannot evict the oldest element from
//! the sender side, so the queue is a `VecDeque` under a mutex with a
//! [`Notify`] pair for readable/writable wakeups.
//!
//! ## Rules
//! - Exactly one pusher (the broadcaster); consumers may share a group.
//! - Depth never exceeds the configured capacity.
//! - `close` is one-way: pushes are dropped, `recv` drains then yields `None`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// What the broadcaster does when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Evict the oldest queued message in favor of the new one.
    DropOldest,
    /// Discard the incoming message; queued ones are untouched.
    DropNewest,
    /// Block the broadcaster until the consumer drains.
    ///
    /// This couples every publisher on the topic to the slow consumer; opt in
    /// knowingly.
    Block,
}

struct Inner<T> {
    queue: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    readable: Notify,
    writable: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Push side of a delivery queue. Held only by the broadcaster.
pub(crate) struct DeliveryQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> DeliveryQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    queue: VecDeque::with_capacity(capacity.max(1)),
                    capacity: capacity.max(1),
                    closed: false,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
            }),
        }
    }

    /// Mints a consumer handle onto this queue.
    ///
    /// Handles share the underlying queue: a message is delivered to exactly
    /// one of them (consumer-group semantics).
    pub(crate) fn subscription(&self) -> Subscription<T> {
        Subscription {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Enqueues `item` per `policy`. Returns whether the item was queued.
    ///
    /// Only [`BufferPolicy::Block`] ever awaits; the drop policies resolve
    /// synchronously.
    pub(crate) async fn push(&self, item: T, policy: BufferPolicy) -> bool {
        loop {
            let notified = self.shared.writable.notified();
            tokio::pin!(notified);
            {
                let mut inner = self.shared.lock();
                if inner.closed {
                    return false;
                }
                if inner.queue.len() < inner.capacity {
                    inner.queue.push_back(item);
                    drop(inner);
                    self.shared.readable.notify_one();
                    return true;
                }
                match policy {
                    BufferPolicy::DropOldest => {
                        inner.queue.pop_front();
                        inner.queue.push_back(item);
                        drop(inner);
                        self.shared.readable.notify_one();
                        return true;
                    }
                    BufferPolicy::DropNewest => return false,
                    BufferPolicy::Block => {
                        // Register for the writable wakeup before releasing
                        // the lock so a concurrent pop cannot slip between
                        // the check and the await.
                        notified.as_mut().enable();
                    }
                }
            }
            notified.await;
        }
    }

    /// Closes the queue and wakes every waiter. Idempotent.
    pub(crate) fn close(&self) {
        {
            let mut inner = self.shared.lock();
            inner.closed = true;
        }
        self.shared.readable.notify_waiters();
        self.shared.writable.notify_waiters();
    }
}

/// Consumer handle for one intracom consumer group.
///
/// Returned by [`Topic::subscribe`](crate::intracom::Topic::subscribe);
/// closed when the group unsubscribes or the topic closes.
pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    /// Receives the next message in publication order.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.readable.notified();
            tokio::pin!(notified);
            {
                let mut inner = self.shared.lock();
                if let Some(item) = inner.queue.pop_front() {
                    // Pass the readable permit along in case a group twin is
                    // parked while more messages sit queued.
                    if !inner.queue.is_empty() {
                        self.shared.readable.notify_one();
                    }
                    drop(inner);
                    self.shared.writable.notify_one();
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drop_oldest_evicts_head() {
        let queue = DeliveryQueue::new(2);
        let mut sub = queue.subscription();

        for n in 0..5 {
            assert!(queue.push(n, BufferPolicy::DropOldest).await);
        }

        assert_eq!(sub.len(), 2);
        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.recv().await, Some(4));
    }

    #[tokio::test]
    async fn drop_newest_discards_incoming() {
        let queue = DeliveryQueue::new(2);
        let mut sub = queue.subscription();

        assert!(queue.push(1, BufferPolicy::DropNewest).await);
        assert!(queue.push(2, BufferPolicy::DropNewest).await);
        assert!(!queue.push(3, BufferPolicy::DropNewest).await);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.len(), 0);
    }

    #[tokio::test]
    async fn blocked_push_completes_on_drain() {
        let queue = Arc::new(DeliveryQueue::new(1));
        let mut sub = queue.subscription();

        assert!(queue.push(1, BufferPolicy::Block).await);

        let pusher = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push(2, BufferPolicy::Block).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pusher.is_finished());

        assert_eq!(sub.recv().await, Some(1));
        assert!(pusher.await.expect("pusher task"));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn close_wakes_blocked_receiver() {
        let queue = DeliveryQueue::<u32>::new(1);
        let mut sub = queue.subscription();

        let receiver = tokio::spawn(async move { sub.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();

        assert_eq!(receiver.await.expect("receiver task"), None);
    }

    #[tokio::test]
    async fn close_drains_before_none() {
        let queue = DeliveryQueue::new(4);
        let mut sub = queue.subscription();

        assert!(queue.push(1, BufferPolicy::Block).await);
        assert!(queue.push(2, BufferPolicy::Block).await);
        queue.close();

        assert!(!queue.push(3, BufferPolicy::Block).await);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.recv().await, None);
    }
}
