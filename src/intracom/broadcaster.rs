//! The topic's single broadcaster task.
//!
//! One task owns the consumer-group map. Publishes fan out from here, and
//! every mutation of the map (subscribe, unsubscribe, close) arrives through
//! the same control channel, so there is no subscribe/publish race to guard
//! against. Control requests take priority over pending publishes.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::error::TopicError;
use crate::intracom::delivery::{BufferPolicy, DeliveryQueue, Subscription};
use crate::intracom::topic::SubscriberConfig;

/// Control requests funneled into the broadcaster task.
pub(crate) enum Request<T> {
    Subscribe {
        config: SubscriberConfig,
        respond: oneshot::Sender<Result<Subscription<T>, TopicError>>,
    },
    Unsubscribe {
        group: String,
        respond: oneshot::Sender<Result<(), TopicError>>,
    },
    Close {
        respond: oneshot::Sender<()>,
    },
}

struct Group<T> {
    queue: DeliveryQueue<T>,
    policy: BufferPolicy,
}

pub(crate) struct Broadcaster<T> {
    subscriber_aware: bool,
    groups: HashMap<String, Group<T>>,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub(crate) fn new(subscriber_aware: bool) -> Self {
        Self {
            subscriber_aware,
            groups: HashMap::new(),
        }
    }

    /// Runs until the topic closes or both channels are dropped.
    pub(crate) async fn run(
        mut self,
        mut publish_rx: mpsc::Receiver<T>,
        mut request_rx: mpsc::Receiver<Request<T>>,
    ) {
        loop {
            if self.subscriber_aware && self.groups.is_empty() {
                // Leave the publish channel untouched so publishers block
                // until a subscriber shows up.
                match request_rx.recv().await {
                    Some(request) => {
                        if self.handle(request) {
                            return;
                        }
                    }
                    None => break,
                }
            } else {
                tokio::select! {
                    biased;
                    request = request_rx.recv() => match request {
                        Some(request) => {
                            if self.handle(request) {
                                return;
                            }
                        }
                        None => break,
                    },
                    msg = publish_rx.recv() => match msg {
                        Some(msg) => self.fan_out(msg).await,
                        None => break,
                    },
                }
            }
        }

        // Topic dropped without an explicit close; release the subscribers.
        self.close_all();
    }

    /// Applies one control request. Returns true when the topic closed.
    fn handle(&mut self, request: Request<T>) -> bool {
        match request {
            Request::Subscribe { config, respond } => {
                let _ = respond.send(self.subscribe(config));
                false
            }
            Request::Unsubscribe { group, respond } => {
                let _ = respond.send(self.unsubscribe(&group));
                false
            }
            Request::Close { respond } => {
                self.close_all();
                let _ = respond.send(());
                true
            }
        }
    }

    fn subscribe(&mut self, config: SubscriberConfig) -> Result<Subscription<T>, TopicError> {
        if let Some(existing) = self.groups.get(&config.consumer_group) {
            if config.err_if_exists {
                return Err(TopicError::GroupExists {
                    group: config.consumer_group,
                });
            }
            // Join the existing group: another handle onto the same queue.
            return Ok(existing.queue.subscription());
        }

        let queue = DeliveryQueue::new(config.buffer_size.max(1));
        let subscription = queue.subscription();
        self.groups.insert(
            config.consumer_group,
            Group {
                queue,
                policy: config.buffer_policy,
            },
        );
        Ok(subscription)
    }

    fn unsubscribe(&mut self, group: &str) -> Result<(), TopicError> {
        match self.groups.remove(group) {
            Some(entry) => {
                entry.queue.close();
                Ok(())
            }
            None => Err(TopicError::GroupUnknown {
                group: group.to_string(),
            }),
        }
    }

    async fn fan_out(&self, msg: T) {
        for group in self.groups.values() {
            group.queue.push(msg.clone(), group.policy).await;
        }
    }

    fn close_all(&mut self) {
        for (_, group) in self.groups.drain() {
            group.queue.close();
        }
    }
}
