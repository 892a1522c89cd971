//! Service registration and the manager-facing service handle.

use std::sync::Arc;

use crate::core::{Manager, RunContinuousManager};
use crate::services::policy::RunPolicy;
use crate::services::runner::ServiceRunner;

/// A service as registered with the daemon: runner, managing strategy, and
/// run policy under one unique name.
///
/// ```no_run
/// # use servisor::{Service, RunPolicy, RunContinuousManager, ServiceContext, ServiceRunner, RunnerError};
/// # use std::time::Duration;
/// # struct Poller;
/// # #[async_trait::async_trait]
/// # impl ServiceRunner for Poller {
/// #     async fn init(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn idle(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn run(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// #     async fn stop(&self, _: &ServiceContext) -> Result<(), RunnerError> { Ok(()) }
/// # }
/// let service = Service::new("poller", Poller)
///     .with_policy(RunPolicy::OnceIfSuccess)
///     .with_manager(
///         RunContinuousManager::new().with_default_delay(Duration::from_secs(3)),
///     );
/// ```
pub struct Service {
    pub name: String,
    pub runner: Arc<dyn ServiceRunner>,
    pub manager: Arc<dyn Manager>,
    pub policy: RunPolicy,
}

impl Service {
    /// Registers `runner` under `name` with the default manager
    /// ([`RunContinuousManager`]) and policy ([`RunPolicy::UntilStopped`]).
    pub fn new(name: impl Into<String>, runner: impl ServiceRunner) -> Self {
        Self {
            name: name.into(),
            runner: Arc::new(runner),
            manager: Arc::new(RunContinuousManager::new()),
            policy: RunPolicy::default(),
        }
    }

    /// Replaces the managing strategy.
    pub fn with_manager(mut self, manager: impl Manager) -> Self {
        self.manager = Arc::new(manager);
        self
    }

    /// Replaces the run policy.
    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// The slice of a [`Service`] a manager works with: everything except the
/// manager itself.
#[derive(Clone)]
pub struct DaemonService {
    pub name: String,
    pub runner: Arc<dyn ServiceRunner>,
    pub policy: RunPolicy,
}

impl From<&Service> for DaemonService {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            runner: Arc::clone(&service.runner),
            policy: service.policy,
        }
    }
}
