//! Service lifecycle managers.
//!
//! A [`Manager`] drives one service's state machine, invoking the runner's
//! callbacks and reporting every state it is about to enter through a
//! [`StateUpdater`]. The daemon ships [`RunContinuousManager`]; alternative
//! strategies plug in per service via
//! [`Service::with_manager`](crate::Service::with_manager).
//!
//! ## RunContinuousManager state machine
//! ```text
//! startup delay
//!      │
//!      ▼
//!    Init ──ok──► Idle ──ok──► Run ──any──► Stop ──► Init (loop)
//!      │ err        │ err                     │
//!      └────────────┴───────────► Stop ◄─────┘
//!
//! policy exits (decided after Stop):
//!   OnceUnbiased   → Exit once a Run completed this cycle
//!   OnceIfSuccess  → Exit once Run and Stop both succeeded
//! cancellation: pre-empts any state wait → Exit
//! ```
//!
//! ## Rules
//! - Every state about to be entered is reported **before** its callback
//!   runs; the terminal Exit is reported exactly once, last.
//! - Each state entry waits its configured delay first (startup delay on the
//!   first entry, per-state override, else the default); cancellation
//!   pre-empts the wait immediately.
//! - Callback errors are logged and steer the next state; they never
//!   terminate the daemon.
//! - A callback panic is caught, logged at Error, and routed to Exit with
//!   Stop still guaranteed to run once. Panics never escape the manager.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time;

use crate::core::ServiceContext;
use crate::logging::Level;
use crate::services::{DaemonService, RunPolicy, RunnerError, State};

/// One reported state transition: `name` is about to enter `state`.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub name: String,
    pub state: State,
}

/// Handle managers use to report transitions to the daemon's aggregator.
#[derive(Clone)]
pub struct StateUpdater {
    tx: mpsc::Sender<StateUpdate>,
}

impl StateUpdater {
    pub(crate) fn new(tx: mpsc::Sender<StateUpdate>) -> Self {
        Self { tx }
    }

    /// Reports that `name` is about to enter `state`.
    ///
    /// A send to a torn-down aggregator is ignored; the manager is on its way
    /// out at that point.
    pub async fn update(&self, name: &str, state: State) {
        let _ = self
            .tx
            .send(StateUpdate {
                name: name.to_string(),
                state,
            })
            .await;
    }
}

/// Per-state overrides for the delay preceding each state's callback.
pub type ManagerStateTimeouts = HashMap<State, Duration>;

/// Strategy that sequences a single service's lifecycle callbacks.
///
/// Invoked by the daemon in the service's own task. Implementations must
/// report states via `updates` as described in the module docs and must not
/// let user panics escape.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    async fn manage(&self, ctx: ServiceContext, service: DaemonService, updates: StateUpdater);
}

/// The default manager: cycles Init → Idle → Run → Stop until cancellation
/// or the service's [`RunPolicy`] ends the loop.
#[derive(Debug, Clone)]
pub struct RunContinuousManager {
    /// Delay before entering a state with no per-state override.
    pub default_delay: Duration,
    /// Delay before the very first Init.
    pub startup_delay: Duration,
    /// Per-state delay overrides.
    pub state_timeouts: ManagerStateTimeouts,
}

impl Default for RunContinuousManager {
    /// No inter-state delay, a near-zero startup delay, no overrides.
    fn default() -> Self {
        Self {
            default_delay: Duration::ZERO,
            startup_delay: Duration::from_nanos(10),
            state_timeouts: ManagerStateTimeouts::new(),
        }
    }
}

impl RunContinuousManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay applied before states without an override. Operators
    /// use this to throttle tight restart loops without touching user code.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Sets the delay before the first Init.
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Overrides the delay before entering `state`.
    pub fn with_state_timeout(mut self, state: State, delay: Duration) -> Self {
        self.state_timeouts.insert(state, delay);
        self
    }
}

/// Result of one panic-guarded callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Failed,
    Panicked,
}

#[async_trait]
impl Manager for RunContinuousManager {
    async fn manage(&self, ctx: ServiceContext, service: DaemonService, updates: StateUpdater) {
        let runner = Arc::clone(&service.runner);

        let mut state = State::Init;
        let mut delay = self.startup_delay;
        let mut has_stopped = false;
        // Per-cycle outcome tracking for the policy decision after Stop.
        let mut run_completed = false;
        let mut run_ok = false;

        while state != State::Exit {
            updates.update(&service.name, state).await;

            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    state = State::Exit;
                    continue;
                }
                _ = time::sleep(delay) => {}
            }

            if has_stopped {
                // Entering a fresh cycle; Stop must run again before exit.
                has_stopped = false;
            }

            let next = match state {
                State::Init => {
                    run_completed = false;
                    run_ok = false;
                    match invoke(&ctx, runner.init(&ctx)).await {
                        Outcome::Ok => State::Idle,
                        Outcome::Failed => State::Stop,
                        Outcome::Panicked => State::Exit,
                    }
                }
                State::Idle => match invoke(&ctx, runner.idle(&ctx)).await {
                    Outcome::Ok => State::Run,
                    Outcome::Failed => State::Stop,
                    Outcome::Panicked => State::Exit,
                },
                State::Run => match invoke(&ctx, runner.run(&ctx)).await {
                    Outcome::Panicked => State::Exit,
                    outcome => {
                        run_completed = true;
                        run_ok = outcome == Outcome::Ok;
                        State::Stop
                    }
                },
                State::Stop => {
                    let outcome = invoke(&ctx, runner.stop(&ctx)).await;
                    has_stopped = true;
                    match outcome {
                        Outcome::Panicked => State::Exit,
                        outcome => match service.policy {
                            RunPolicy::UntilStopped => State::Init,
                            RunPolicy::OnceUnbiased if run_completed => State::Exit,
                            RunPolicy::OnceIfSuccess
                                if run_ok && outcome == Outcome::Ok =>
                            {
                                State::Exit
                            }
                            _ => State::Init,
                        },
                    }
                }
                State::Exit => State::Exit,
            };

            delay = self
                .state_timeouts
                .get(&next)
                .copied()
                .unwrap_or(self.default_delay);
            state = next;
        }

        // Committed to exiting; make sure Stop has run for this cycle even
        // when the loop was left from Init/Idle/Run.
        if !has_stopped {
            let _ = invoke(&ctx, runner.stop(&ctx)).await;
        }

        updates.update(&service.name, State::Exit).await;
    }
}

/// Runs one callback with error logging and panic capture.
async fn invoke(
    ctx: &ServiceContext,
    callback: impl Future<Output = Result<(), RunnerError>>,
) -> Outcome {
    match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(Ok(())) => Outcome::Ok,
        Ok(Err(err)) => {
            ctx.log(Level::Error, err.to_string());
            Outcome::Failed
        }
        Err(panic) => {
            ctx.log(
                Level::Error,
                format!("recovered from a panic: {}", panic_message(&*panic)),
            );
            Outcome::Panicked
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intracom::{Topic, TopicConfig};
    use crate::logging::DaemonLog;
    use crate::services::ServiceRunner;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    /// Scripted runner: fails the first `init_failures` inits and the first
    /// `run_failures` runs, optionally panics in Run, and records every
    /// callback invocation.
    #[derive(Default)]
    struct MockRunner {
        calls: Mutex<Vec<&'static str>>,
        init_failures: AtomicU32,
        run_failures: AtomicU32,
        panic_in_run: bool,
    }

    impl MockRunner {
        fn record(&self, call: &'static str) {
            self.calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }

        fn take_failure(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl ServiceRunner for MockRunner {
        async fn init(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
            self.record("init");
            if Self::take_failure(&self.init_failures) {
                return Err("init failed".into());
            }
            Ok(())
        }

        async fn idle(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
            self.record("idle");
            Ok(())
        }

        async fn run(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
            self.record("run");
            if self.panic_in_run {
                panic!("intentional panic");
            }
            if Self::take_failure(&self.run_failures) {
                return Err("run failed".into());
            }
            Ok(())
        }

        async fn stop(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
            self.record("stop");
            Ok(())
        }
    }

    struct Harness {
        runner: Arc<MockRunner>,
        states: Vec<State>,
        logs: Vec<DaemonLog>,
    }

    /// Drives one manager to completion, collecting every reported state.
    async fn drive(
        runner: MockRunner,
        policy: RunPolicy,
        cancel_after: Option<Duration>,
    ) -> Harness {
        let runner = Arc::new(runner);
        let (log_tx, mut log_rx) = mpsc::channel(256);
        let (update_tx, mut update_rx) = mpsc::channel(256);
        let topic = Arc::new(Topic::new(TopicConfig::new("service-states")));
        let token = CancellationToken::new();
        let ctx = ServiceContext::new("svc", token.clone(), log_tx, topic);

        let service = DaemonService {
            name: "svc".to_string(),
            runner: Arc::clone(&runner) as Arc<dyn ServiceRunner>,
            policy,
        };
        let manager = RunContinuousManager::new().with_default_delay(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            manager
                .manage(ctx, service, StateUpdater::new(update_tx))
                .await;
        });

        if let Some(after) = cancel_after {
            time::sleep(after).await;
            token.cancel();
        }
        task.await.expect("manager task");

        let mut states = Vec::new();
        while let Some(update) = update_rx.recv().await {
            assert_eq!(update.name, "svc");
            states.push(update.state);
        }
        let mut logs = Vec::new();
        while let Ok(record) = log_rx.try_recv() {
            logs.push(record);
        }
        Harness {
            runner,
            states,
            logs,
        }
    }

    fn count(states: &[State], state: State) -> usize {
        states.iter().filter(|s| **s == state).count()
    }

    #[tokio::test]
    async fn until_stopped_cycles_then_exits_on_cancel() {
        let h = drive(
            MockRunner::default(),
            RunPolicy::UntilStopped,
            Some(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(
            h.states[..5],
            [State::Init, State::Idle, State::Run, State::Stop, State::Init]
        );
        assert_eq!(*h.states.last().expect("states"), State::Exit);
        assert_eq!(count(&h.states, State::Exit), 1);
    }

    #[tokio::test]
    async fn init_error_skips_idle_and_run() {
        let h = drive(
            MockRunner {
                init_failures: AtomicU32::new(1),
                ..MockRunner::default()
            },
            RunPolicy::OnceIfSuccess,
            None,
        )
        .await;

        assert_eq!(
            h.states,
            [
                State::Init,
                State::Stop,
                State::Init,
                State::Idle,
                State::Run,
                State::Stop,
                State::Exit
            ]
        );
    }

    #[tokio::test]
    async fn once_if_success_retries_until_run_succeeds() {
        let h = drive(
            MockRunner {
                run_failures: AtomicU32::new(2),
                ..MockRunner::default()
            },
            RunPolicy::OnceIfSuccess,
            None,
        )
        .await;

        let cycle = [State::Init, State::Idle, State::Run, State::Stop];
        let expected: Vec<State> = cycle
            .iter()
            .cycle()
            .take(12)
            .copied()
            .chain([State::Exit])
            .collect();
        assert_eq!(h.states, expected);
        // Exactly one successful Run precedes Exit.
        assert_eq!(h.runner.calls().iter().filter(|c| **c == "run").count(), 3);
    }

    #[tokio::test]
    async fn once_unbiased_exits_after_single_run_even_on_error() {
        let h = drive(
            MockRunner {
                run_failures: AtomicU32::new(5),
                ..MockRunner::default()
            },
            RunPolicy::OnceUnbiased,
            None,
        )
        .await;

        assert_eq!(
            h.states,
            [State::Init, State::Idle, State::Run, State::Stop, State::Exit]
        );
        assert_eq!(h.runner.calls(), ["init", "idle", "run", "stop"]);
    }

    #[tokio::test]
    async fn panic_in_run_logs_stops_once_and_exits() {
        let h = drive(
            MockRunner {
                panic_in_run: true,
                ..MockRunner::default()
            },
            RunPolicy::UntilStopped,
            None,
        )
        .await;

        assert_eq!(h.states, [State::Init, State::Idle, State::Run, State::Exit]);
        assert_eq!(h.runner.calls(), ["init", "idle", "run", "stop"]);
        assert!(
            h.logs
                .iter()
                .any(|r| r.level == Level::Error && r.message.contains("panic")),
            "expected an error log for the recovered panic"
        );
    }

    #[tokio::test]
    async fn pre_cancelled_context_exits_with_single_stop() {
        let runner = MockRunner::default();
        let (log_tx, _log_rx) = mpsc::channel(16);
        let (update_tx, mut update_rx) = mpsc::channel(16);
        let topic = Arc::new(Topic::new(TopicConfig::new("service-states")));
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ServiceContext::new("svc", token, log_tx, topic);
        let runner = Arc::new(runner);

        RunContinuousManager::new()
            .manage(
                ctx,
                DaemonService {
                    name: "svc".to_string(),
                    runner: Arc::clone(&runner) as Arc<dyn ServiceRunner>,
                    policy: RunPolicy::UntilStopped,
                },
                StateUpdater::new(update_tx),
            )
            .await;

        let mut states = Vec::new();
        while let Some(update) = update_rx.recv().await {
            states.push(update.state);
        }
        assert_eq!(states, [State::Init, State::Exit]);
        assert_eq!(runner.calls(), ["stop"]);
    }
}
