//! The daemon supervisor: spawns one manager task per service, aggregates
//! their state reports into the shared snapshot topic, and sequences
//! shutdown.
//!
//! ## Architecture
//! ```text
//! Service[] ──► Daemon::run()
//!                   │
//!                   ├──► log consumer task  ◄── bounded log channel (all contexts)
//!                   │
//!                   ├──► aggregator task ── sole writer of ServiceStates
//!                   │         └──► publishes snapshot to Topic<ServiceStates>
//!                   │                              ▲
//!                   ├──► manager task per service ─┘ (updateState before
//!                   │         each callback; terminal Exit exactly once)
//!                   │
//!                   └──► wait for: OS signal / root cancel / all managers done
//!                             └──► cancel root → drain managers
//! ```
//!
//! ## Shutdown order
//! 1. root context cancelled (signal, `cancellation_token()`, or natural
//!    completion of every manager);
//! 2. each manager drains to Exit (Stop guaranteed once per cycle);
//! 3. aggregator ends once every updater handle is dropped;
//! 4. topic closed (watch subscriptions observe a clean close);
//! 5. log channel closed and drained.
//!
//! This order is what makes "send on closed channel" impossible: nothing
//! publishes after the topic closes, nothing logs after the log channel
//! closes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::DaemonConfig;
use crate::core::manager::{StateUpdate, StateUpdater, panic_message};
use crate::core::notify::{NotifyState, SystemNotifier};
use crate::core::{ServiceContext, signals};
use crate::error::{DaemonError, TopicError};
use crate::intracom::{Topic, TopicConfig};
use crate::logging::{DaemonLog, Level, LogHandler};
use crate::services::{DaemonService, Service, ServiceStates, State};

/// Name of the topic carrying service state snapshots.
const SERVICE_STATES_TOPIC: &str = "internal-service-states";

/// Capacity of the aggregator's update channel.
const STATE_UPDATE_CAPACITY: usize = 64;

/// Process-level owner of services, the state topic, and the log channel.
///
/// ```no_run
/// # use servisor::{ConsoleLogger, Daemon, DaemonConfig, Service, ServiceContext, ServiceRunner, RunnerError};
/// # struct Poller;
/// # #[async_trait::async_trait]
/// # impl ServiceRunner for Poller {
/// #     async fn init(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn idle(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn run(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn stop(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// # }
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let daemon = Daemon::new(DaemonConfig::default(), ConsoleLogger::default());
/// daemon.run(vec![Service::new("poller", Poller)]).await?;
/// # Ok(())
/// # }
/// ```
pub struct Daemon {
    config: DaemonConfig,
    handler: Arc<dyn LogHandler>,
    notifier: Option<Arc<dyn SystemNotifier>>,
    root: CancellationToken,
}

impl Daemon {
    pub fn new(config: DaemonConfig, handler: impl LogHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            notifier: None,
            root: CancellationToken::new(),
        }
    }

    /// Attaches an OS service-manager notifier.
    pub fn with_notifier(mut self, notifier: impl SystemNotifier) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// A handle onto the daemon's root cancellation scope.
    ///
    /// Cancelling it shuts the daemon down exactly like an OS signal would.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Runs every service until shutdown.
    ///
    /// Returns `Ok(())` on a clean shutdown. The error cases are startup
    /// validation, a notifier that fails to start, and a manager task that
    /// panicked outside its own recovery.
    pub async fn run(&self, services: Vec<Service>) -> Result<(), DaemonError> {
        validate(&services)?;

        // Log consumer: single drainer, ends once every sender is gone.
        let (log_tx, mut log_rx) = mpsc::channel::<DaemonLog>(self.config.log_capacity.max(1));
        let handler = Arc::clone(&self.handler);
        let log_task = tokio::spawn(async move {
            while let Some(record) = log_rx.recv().await {
                handler.handle(record);
            }
        });

        let topic = Arc::new(Topic::new(TopicConfig::new(SERVICE_STATES_TOPIC)));

        // Aggregator: the only writer of the ServiceStates aggregate. Every
        // service starts with an Init entry; entries never disappear.
        let (update_tx, mut update_rx) = mpsc::channel::<StateUpdate>(STATE_UPDATE_CAPACITY);
        let mut aggregate: ServiceStates = services
            .iter()
            .map(|service| (service.name.clone(), State::Init))
            .collect();
        let aggregator = {
            let topic = Arc::clone(&topic);
            tokio::spawn(async move {
                while let Some(update) = update_rx.recv().await {
                    aggregate.set(update.name, update.state);
                    if topic.publish(aggregate.clone()).await.is_err() {
                        break;
                    }
                }
            })
        };

        let daemon_ctx = ServiceContext::new(
            "daemon",
            self.root.child_token(),
            log_tx.clone(),
            Arc::clone(&topic),
        );

        let mut alive_ticker = None;
        if let Some(notifier) = &self.notifier {
            if let Err(source) = notifier.start(&daemon_ctx).await {
                drop(update_tx);
                let _ = aggregator.await;
                let _ = topic.close().await;
                drop(daemon_ctx);
                drop(log_tx);
                let _ = log_task.await;
                return Err(DaemonError::Notifier { source });
            }
            if let Err(err) = notifier.notify(NotifyState::Ready) {
                daemon_ctx.log(Level::Warning, format!("ready notification failed: {err}"));
            }
            if self.config.report_alive_secs > 0 {
                alive_ticker = Some(self.spawn_alive_ticker(notifier, &daemon_ctx));
            }
        }

        // One manager task per service, each under a child of the root scope.
        let mut managers = JoinSet::new();
        for service in &services {
            let ctx = ServiceContext::new(
                &service.name,
                self.root.child_token(),
                log_tx.clone(),
                Arc::clone(&topic),
            );
            let manager = Arc::clone(&service.manager);
            let daemon_service = DaemonService::from(service);
            let updates = StateUpdater::new(update_tx.clone());
            managers.spawn(async move {
                manager.manage(ctx, daemon_service, updates).await;
            });
        }
        drop(update_tx);

        daemon_ctx.log(Level::Info, "daemon started all services");
        let exit_err = self.drive_shutdown(&mut managers, &daemon_ctx).await;

        // Managers are done; the aggregator ends once their updaters drop.
        self.root.cancel();
        if let Some(ticker) = alive_ticker {
            let _ = ticker.await;
        }
        let _ = aggregator.await;
        if let Err(err) = topic.close().await {
            if !matches!(err, TopicError::AlreadyClosed) {
                daemon_ctx.log(Level::Debug, format!("state topic close failed: {err}"));
            }
        }
        if let Some(notifier) = &self.notifier {
            let _ = notifier.notify(NotifyState::Stopped);
        }
        daemon_ctx.log(Level::Debug, "daemon shutdown complete");
        drop(daemon_ctx);
        drop(log_tx);
        let _ = log_task.await;

        match exit_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Waits for a shutdown trigger, then drains every manager to Exit.
    async fn drive_shutdown(
        &self,
        managers: &mut JoinSet<()>,
        ctx: &ServiceContext,
    ) -> Option<DaemonError> {
        let mut exit_err = None;

        let signal_wait = signals::wait_for_signal(&self.config.signals);
        tokio::pin!(signal_wait);

        loop {
            tokio::select! {
                signal = &mut signal_wait => {
                    match signal {
                        Ok(()) => ctx.log(Level::Notice, "os signal received, shutting down"),
                        Err(err) => {
                            ctx.log(Level::Error, format!("signal watcher failed: {err}"));
                        }
                    }
                    break;
                }
                _ = self.root.cancelled() => {
                    ctx.log(Level::Notice, "shutdown requested");
                    break;
                }
                joined = managers.join_next() => match joined {
                    Some(result) => {
                        record_manager_exit(result, &mut exit_err);
                        if managers.is_empty() {
                            ctx.log(Level::Info, "all services stopped on their own");
                            return exit_err;
                        }
                    }
                    None => return exit_err,
                },
            }
        }

        if let Some(notifier) = &self.notifier {
            let _ = notifier.notify(NotifyState::Stopping);
        }
        self.root.cancel();
        while let Some(result) = managers.join_next().await {
            record_manager_exit(result, &mut exit_err);
        }
        ctx.log(Level::Info, "all services have stopped");
        exit_err
    }

    fn spawn_alive_ticker(
        &self,
        notifier: &Arc<dyn SystemNotifier>,
        ctx: &ServiceContext,
    ) -> tokio::task::JoinHandle<()> {
        let notifier = Arc::clone(notifier);
        let ctx = ctx.clone();
        let period = Duration::from_secs(self.config.report_alive_secs);
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The immediate first tick; Ready was just sent.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(err) = notifier.notify(NotifyState::Alive) {
                            ctx.log(Level::Warning, format!("alive notification failed: {err}"));
                        }
                    }
                }
            }
        })
    }
}

fn validate(services: &[Service]) -> Result<(), DaemonError> {
    if services.is_empty() {
        return Err(DaemonError::NoServices);
    }
    let mut seen = HashSet::new();
    for service in services {
        if service.name.is_empty() {
            return Err(DaemonError::EmptyServiceName);
        }
        if !seen.insert(service.name.as_str()) {
            return Err(DaemonError::DuplicateService {
                name: service.name.clone(),
            });
        }
    }
    Ok(())
}

/// Folds one manager task result into the daemon exit error.
///
/// Managers catch user panics themselves; a panicking join here means the
/// supervision task itself blew up, which becomes the daemon's exit error.
fn record_manager_exit(result: Result<(), tokio::task::JoinError>, exit_err: &mut Option<DaemonError>) {
    if let Err(err) = result {
        if err.is_panic() {
            let reason = panic_message(&*err.into_panic());
            exit_err.get_or_insert(DaemonError::SupervisorPanic { reason });
        }
    }
}
