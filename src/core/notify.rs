//! OS service-manager notification interface.
//!
//! The daemon reports its coarse lifecycle to an external supervisor
//! (systemd or similar) through a [`SystemNotifier`]. The wire format is the
//! implementation's business; the daemon only consumes this interface:
//! `Ready` after all services are spawned, `Alive` on the report-alive
//! interval, `Stopping` when shutdown begins, `Stopped` at the end.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ServiceContext;

/// Coarse external-facing lifecycle reported to an OS service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyState {
    Stopped,
    Stopping,
    Restarting,
    Reloading,
    Ready,
    Alive,
}

impl NotifyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyState::Stopped => "STOPPED",
            NotifyState::Stopping => "STOPPING",
            NotifyState::Restarting => "RESTARTING",
            NotifyState::Reloading => "RELOADING",
            NotifyState::Ready => "READY",
            NotifyState::Alive => "ALIVE",
        }
    }
}

impl std::fmt::Display for NotifyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge to an OS service manager.
///
/// `start` runs once before services spawn; its context carries the daemon's
/// cancellation scope and log sink. `notify` must be cheap and non-blocking;
/// it is called from the daemon's supervision path.
#[async_trait]
pub trait SystemNotifier: Send + Sync + 'static {
    async fn start(&self, ctx: &ServiceContext) -> std::io::Result<()>;

    fn notify(&self, state: NotifyState) -> std::io::Result<()>;
}

#[async_trait]
impl<T: SystemNotifier + ?Sized> SystemNotifier for Arc<T> {
    async fn start(&self, ctx: &ServiceContext) -> std::io::Result<()> {
        (**self).start(ctx).await
    }

    fn notify(&self, state: NotifyState) -> std::io::Result<()> {
        (**self).notify(state)
    }
}
