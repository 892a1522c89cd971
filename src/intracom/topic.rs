//! Typed broadcast topic with named consumer groups.
//!
//! A [`Topic`] carries one message type to any number of consumer groups,
//! each with its own bounded queue and overflow policy. Fan-out and all
//! subscriber-map mutation happen on the topic's single broadcaster task
//! (see [`broadcaster`](super::broadcaster)); the surface here is the
//! request/response plumbing around it.
//!
//! ## Lifecycle
//! ```text
//! Topic::new ──► broadcaster task
//!    │                 ▲
//!    ├─ publish ───────┤ (bounded publish channel)
//!    ├─ subscribe ─────┤ (control channel, request_timeout bound)
//!    ├─ unsubscribe ───┤
//!    └─ close ─────────┘ one-shot; closes every delivery queue
//! ```
//!
//! ## Rules
//! - Per-group delivery preserves publication order, modulo that group's
//!   drop policy.
//! - Subscribe/unsubscribe fail with [`TopicError::Timeout`] instead of
//!   deadlocking when the broadcaster is stuck on a `Block`-policy consumer.
//! - A closed topic rejects every operation with [`TopicError::Closed`];
//!   in-flight publishes racing the close are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;

use crate::error::TopicError;
use crate::intracom::broadcaster::{Broadcaster, Request};
use crate::intracom::delivery::{BufferPolicy, Subscription};

/// Default bound on broadcaster control round-trips.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Construction options for a [`Topic`].
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Topic name, used for diagnostics only.
    pub name: String,
    /// When true, the broadcaster refuses to drain publishes while no
    /// consumer group exists, so publishers block instead of losing messages.
    pub subscriber_aware: bool,
    /// Bound on subscribe/unsubscribe round-trips to the broadcaster.
    pub request_timeout: Duration,
}

impl TopicConfig {
    /// Options with the given name: not subscriber-aware, 2s request timeout.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriber_aware: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Per-consumer-group subscription options.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Consumer group identity; one delivery queue per group.
    pub consumer_group: String,
    /// Fail with [`TopicError::GroupExists`] instead of joining an existing
    /// group.
    pub err_if_exists: bool,
    /// Delivery queue depth; clamped to at least 1.
    pub buffer_size: usize,
    /// What to do when the queue is full.
    pub buffer_policy: BufferPolicy,
}

impl SubscriberConfig {
    /// Options for the given group: join-if-exists, buffer of 1, DropOldest.
    pub fn new(consumer_group: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            err_if_exists: false,
            buffer_size: 1,
            buffer_policy: BufferPolicy::DropOldest,
        }
    }
}

/// A typed broadcast channel with named consumer groups.
pub struct Topic<T> {
    name: String,
    publish_tx: mpsc::Sender<T>,
    request_tx: mpsc::Sender<Request<T>>,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl<T: Clone + Send + 'static> Topic<T> {
    /// Creates the topic and spawns its broadcaster task.
    pub fn new(config: TopicConfig) -> Self {
        let (publish_tx, publish_rx) = mpsc::channel(1);
        let (request_tx, request_rx) = mpsc::channel(1);

        tokio::spawn(Broadcaster::new(config.subscriber_aware).run(publish_rx, request_rx));

        Self {
            name: config.name,
            publish_tx,
            request_tx,
            request_timeout: config.request_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues `msg` for broadcast.
    ///
    /// Blocks only while the publish channel is full, which on a
    /// subscriber-aware topic with no subscribers is the intended
    /// backpressure. After [`close`](Self::close) the message is discarded
    /// and [`TopicError::Closed`] returned.
    pub async fn publish(&self, msg: T) -> Result<(), TopicError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TopicError::Closed);
        }
        self.publish_tx
            .send(msg)
            .await
            .map_err(|_| TopicError::Closed)
    }

    /// Adds (or joins) a consumer group and returns its delivery handle.
    pub async fn subscribe(&self, config: SubscriberConfig) -> Result<Subscription<T>, TopicError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TopicError::Closed);
        }

        let (respond, response) = oneshot::channel();
        self.request(Request::Subscribe { config, respond }, response)
            .await?
    }

    /// Removes a consumer group and closes its delivery queue.
    pub async fn unsubscribe(&self, group: &str) -> Result<(), TopicError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TopicError::Closed);
        }

        let (respond, response) = oneshot::channel();
        self.request(
            Request::Unsubscribe {
                group: group.to_string(),
                respond,
            },
            response,
        )
        .await?
    }

    /// Closes the topic: every delivery queue is closed and all further
    /// operations are rejected. One-shot; the second call returns
    /// [`TopicError::AlreadyClosed`].
    pub async fn close(&self) -> Result<(), TopicError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(TopicError::AlreadyClosed);
        }

        let (respond, response) = oneshot::channel();
        if self.request_tx.send(Request::Close { respond }).await.is_ok() {
            let _ = response.await;
        }
        Ok(())
    }

    /// One control round-trip, bounded by the request timeout.
    async fn request<R>(
        &self,
        request: Request<T>,
        response: oneshot::Receiver<R>,
    ) -> Result<R, TopicError> {
        let exchange = async {
            self.request_tx
                .send(request)
                .await
                .map_err(|_| TopicError::Closed)?;
            response.await.map_err(|_| TopicError::Closed)
        };

        match time::timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TopicError::Timeout {
                timeout: self.request_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn topic() -> Topic<u32> {
        Topic::new(TopicConfig::new("test"))
    }

    #[tokio::test]
    async fn publish_reaches_every_group() {
        let topic = topic();
        let mut a = topic
            .subscribe(SubscriberConfig {
                buffer_size: 4,
                ..SubscriberConfig::new("a")
            })
            .await
            .expect("subscribe a");
        let mut b = topic
            .subscribe(SubscriberConfig {
                buffer_size: 4,
                ..SubscriberConfig::new("b")
            })
            .await
            .expect("subscribe b");

        topic.publish(1).await.expect("publish");
        topic.publish(2).await.expect("publish");

        assert_eq!(a.recv().await, Some(1));
        assert_eq!(a.recv().await, Some(2));
        assert_eq!(b.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(2));
    }

    #[tokio::test]
    async fn err_if_exists_rejects_duplicate_group() {
        let topic = topic();
        let _sub = topic
            .subscribe(SubscriberConfig::new("watchers"))
            .await
            .expect("first subscribe");

        let err = topic
            .subscribe(SubscriberConfig {
                err_if_exists: true,
                ..SubscriberConfig::new("watchers")
            })
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, TopicError::GroupExists { .. }));

        // Without exclusivity the subscriber joins the existing group.
        let joined = topic.subscribe(SubscriberConfig::new("watchers")).await;
        assert!(joined.is_ok());
    }

    #[tokio::test]
    async fn joined_group_shares_one_queue() {
        let topic = topic();
        let mut first = topic
            .subscribe(SubscriberConfig {
                buffer_size: 2,
                ..SubscriberConfig::new("shared")
            })
            .await
            .expect("subscribe");
        let second = topic
            .subscribe(SubscriberConfig::new("shared"))
            .await
            .expect("join");

        topic.publish(7).await.expect("publish");

        // Delivered exactly once across the group.
        assert_eq!(first.recv().await, Some(7));
        assert_eq!(second.len(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_closes_and_second_call_is_unknown() {
        let topic = topic();
        let mut sub = topic
            .subscribe(SubscriberConfig::new("once"))
            .await
            .expect("subscribe");

        topic.unsubscribe("once").await.expect("unsubscribe");
        assert_eq!(sub.recv().await, None);

        let err = topic.unsubscribe("once").await.expect_err("gone");
        assert!(matches!(err, TopicError::GroupUnknown { .. }));
    }

    #[tokio::test]
    async fn close_is_one_shot_and_rejects_operations() {
        let topic = topic();
        let mut sub = topic
            .subscribe(SubscriberConfig::new("group"))
            .await
            .expect("subscribe");

        topic.close().await.expect("first close");
        assert_eq!(sub.recv().await, None);

        assert!(matches!(
            topic.close().await,
            Err(TopicError::AlreadyClosed)
        ));
        assert!(matches!(topic.publish(1).await, Err(TopicError::Closed)));
        assert!(matches!(
            topic.subscribe(SubscriberConfig::new("late")).await,
            Err(TopicError::Closed)
        ));
        assert!(matches!(
            topic.unsubscribe("group").await,
            Err(TopicError::Closed)
        ));
    }

    #[tokio::test]
    async fn drop_oldest_depth_never_exceeds_buffer() {
        let topic = topic();
        let mut sub = topic
            .subscribe(SubscriberConfig::new("slow"))
            .await
            .expect("subscribe");

        for n in 0..1000u32 {
            topic.publish(n).await.expect("publish");
        }
        // Let the broadcaster drain its publish channel.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(sub.len() <= 1);
        let last = sub.recv().await.expect("one message queued");
        // The slow consumer sees the most recent message.
        assert_eq!(last, 999);
    }

    #[tokio::test]
    async fn subscriber_aware_publish_blocks_until_first_subscribe() {
        let topic = Arc::new(Topic::<u32>::new(TopicConfig {
            subscriber_aware: true,
            ..TopicConfig::new("aware")
        }));

        // First publish parks in the publish channel buffer; the second has
        // nowhere to go while there are no subscribers.
        topic.publish(1).await.expect("buffered publish");
        let blocked = {
            let topic = Arc::clone(&topic);
            tokio::spawn(async move { topic.publish(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let mut sub = topic
            .subscribe(SubscriberConfig {
                buffer_size: 4,
                ..SubscriberConfig::new("late")
            })
            .await
            .expect("subscribe");

        blocked
            .await
            .expect("publisher task")
            .expect("blocked publish completes");
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn control_requests_time_out_when_broadcaster_is_stuck() {
        let topic = Arc::new(Topic::<u32>::new(TopicConfig {
            request_timeout: Duration::from_millis(50),
            ..TopicConfig::new("stuck")
        }));

        // A full Block-policy queue with no consumer wedges the broadcaster.
        let _sub = topic
            .subscribe(SubscriberConfig {
                buffer_size: 1,
                buffer_policy: BufferPolicy::Block,
                ..SubscriberConfig::new("wedge")
            })
            .await
            .expect("subscribe");
        topic.publish(1).await.expect("fills the queue");
        topic.publish(2).await.expect("parks in publish channel");
        let _ = {
            let topic = Arc::clone(&topic);
            tokio::spawn(async move { topic.publish(3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = topic
            .subscribe(SubscriberConfig::new("other"))
            .await
            .expect_err("broadcaster is stuck");
        assert!(matches!(err, TopicError::Timeout { .. }));
    }
}
