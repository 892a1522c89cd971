//! Per-service coordination surface.
//!
//! A [`ServiceContext`] is the one object handed to user lifecycle callbacks.
//! It fuses four concerns:
//!
//! - **cancellation**: a [`CancellationToken`] rooted at the daemon;
//! - **identity**: the service name, also seeded as a `service=` log field;
//! - **logging**: bounded, non-blocking emission of [`DaemonLog`] records;
//! - **watching**: subscriptions onto the shared service-state topic.
//!
//! Derivation is explicit: [`with_fields`](ServiceContext::with_fields)
//! shares the cancellation scope, [`with_parent`](ServiceContext::with_parent)
//! detaches onto a fresh one. They are intentionally different operations.
//!
//! ## Watches
//! Each `watch_*` call spawns a task that subscribes to the state topic under
//! a consumer group derived from (owner, action, target), so the same watch
//! issued twice joins one group instead of doubling fan-out. The returned
//! token cancels that watch alone; cancelling the service context cancels
//! every watch derived from it. Either path unsubscribes the group before the
//! stream closes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::intracom::{BufferPolicy, SubscriberConfig, Topic};
use crate::logging::{DaemonLog, Field, Level};
use crate::services::{ServiceAction, ServiceFilter, ServiceStates, State};

/// Cancellation, identity, logging and state-watching for one service.
///
/// Cheap to clone; clones share the same cancellation scope, log sink and
/// state topic.
#[derive(Clone)]
pub struct ServiceContext {
    name: Arc<str>,
    fields: Vec<Field>,
    token: CancellationToken,
    log_tx: mpsc::Sender<DaemonLog>,
    states: Arc<Topic<ServiceStates>>,
}

impl ServiceContext {
    pub(crate) fn new(
        name: &str,
        token: CancellationToken,
        log_tx: mpsc::Sender<DaemonLog>,
        states: Arc<Topic<ServiceStates>>,
    ) -> Self {
        let mut fields = Vec::new();
        if !name.is_empty() {
            fields.push(Field::string("service", name));
        }
        Self {
            name: Arc::from(name),
            fields,
            token,
            log_tx,
            states,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the service's scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the service's scope is cancelled. Callbacks should
    /// select on this to exit promptly during shutdown.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The underlying token, for composing with user-owned tasks and timers.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Emits a log record carrying the context's accumulated fields.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.log_with(level, message, Vec::new());
    }

    /// Emits a log record with extra fields ahead of the context's own.
    ///
    /// Never blocks: if the log channel is full or closed the record is
    /// dropped rather than stalling the caller.
    pub fn log_with(&self, level: Level, message: impl Into<String>, fields: Vec<Field>) {
        let mut fields = fields;
        fields.extend(self.fields.iter().cloned());
        let _ = self.log_tx.try_send(DaemonLog {
            name: self.name.to_string(),
            level,
            message: message.into(),
            fields,
        });
    }

    /// Returns a context with `fields` prepended to the existing fields,
    /// sharing this context's cancellation scope.
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> ServiceContext {
        let mut merged: Vec<Field> = fields.into_iter().collect();
        merged.extend(self.fields.iter().cloned());
        ServiceContext {
            fields: merged,
            ..self.clone()
        }
    }

    /// Returns a context with the same name, fields, log sink and topic, but
    /// a fresh cancellation scope under `parent`. Cancelling the original
    /// context does not cancel the returned one.
    pub fn with_parent(&self, parent: &CancellationToken) -> ServiceContext {
        ServiceContext {
            token: parent.child_token(),
            ..self.clone()
        }
    }

    /// Streams every published snapshot through `filter`.
    ///
    /// The returned token cancels the watch; the stream then closes after the
    /// consumer group is removed.
    pub fn watch_all_states(
        &self,
        filter: ServiceFilter,
    ) -> (mpsc::Receiver<ServiceStates>, CancellationToken) {
        let consumer = format!("{}.states.all", self.name);
        self.spawn_watch(consumer, move |states| Some(filter.apply(states)))
    }

    /// Streams the satisfying subset whenever **at least one** of `services`
    /// matches `action`/`target` in a published snapshot.
    pub fn watch_any_services<I, S>(
        &self,
        action: ServiceAction,
        target: State,
        services: I,
    ) -> (mpsc::Receiver<ServiceStates>, CancellationToken)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = services.into_iter().map(Into::into).collect();
        let consumer = self.states_consumer(action, target);
        self.spawn_watch(consumer, move |states| {
            let interested = interested_subset(states, action, target, &names);
            (!interested.is_empty()).then_some(interested)
        })
    }

    /// Streams the matching subset only for snapshots in which **every** name
    /// in `services` satisfies `action`/`target`, and keeps streaming for as
    /// long as the condition holds on later snapshots.
    pub fn watch_all_services<I, S>(
        &self,
        action: ServiceAction,
        target: State,
        services: I,
    ) -> (mpsc::Receiver<ServiceStates>, CancellationToken)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = services.into_iter().map(Into::into).collect();
        let consumer = self.states_consumer(action, target);
        self.spawn_watch(consumer, move |states| {
            let interested = interested_subset(states, action, target, &names);
            (interested.len() == names.len()).then_some(interested)
        })
    }

    /// Deterministic consumer-group name for a predicate watch, so repeated
    /// identical watches join one group.
    fn states_consumer(&self, action: ServiceAction, target: State) -> String {
        format!("{}.states.{}.{}", self.name, action, target)
    }

    /// Common watch plumbing: subscribe, filter, forward, unsubscribe.
    fn spawn_watch<F>(
        &self,
        consumer_group: String,
        emit: F,
    ) -> (mpsc::Receiver<ServiceStates>, CancellationToken)
    where
        F: Fn(&ServiceStates) -> Option<ServiceStates> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let cancel = self.token.child_token();
        let watch_token = cancel.clone();
        let ctx = self.clone();

        tokio::spawn(async move {
            let config = SubscriberConfig {
                consumer_group: consumer_group.clone(),
                err_if_exists: false,
                buffer_size: 1,
                buffer_policy: BufferPolicy::DropOldest,
            };
            let mut sub = match ctx.states.subscribe(config).await {
                Ok(sub) => sub,
                Err(err) => {
                    ctx.log(
                        Level::Error,
                        format!("failed to subscribe to service states: {err}"),
                    );
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = watch_token.cancelled() => break,
                    states = sub.recv() => {
                        let Some(states) = states else { break };
                        let Some(out) = emit(&states) else { continue };
                        tokio::select! {
                            _ = watch_token.cancelled() => break,
                            sent = tx.send(out) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            // A twin watch sharing the group may already have removed it.
            if let Err(err) = ctx.states.unsubscribe(&consumer_group).await {
                ctx.log(
                    Level::Debug,
                    format!("failed to unsubscribe from service states: {err}"),
                );
            }
        });

        (rx, cancel)
    }
}

/// Applies the watch predicate to each named service, collecting matches.
fn interested_subset(
    states: &ServiceStates,
    action: ServiceAction,
    target: State,
    names: &[String],
) -> ServiceStates {
    names
        .iter()
        .filter_map(|name| {
            states.get(name).and_then(|state| {
                let matches = match action {
                    ServiceAction::Entering => state == target,
                    ServiceAction::Exiting => state != target,
                };
                matches.then(|| (name.clone(), state))
            })
        })
        .collect()
}
