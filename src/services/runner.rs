//! The user-facing service contract.
//!
//! A [`ServiceRunner`] is the unit of user work: four async lifecycle
//! callbacks that the managing strategy sequences. Each callback receives the
//! service's [`ServiceContext`] and should watch
//! [`cancelled`](crate::ServiceContext::cancelled) to exit promptly on
//! shutdown; a callback that ignores it is still safe, but cancellation
//! latency degrades to however long the callback runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ServiceContext;

/// Opaque error returned from lifecycle callbacks.
///
/// The manager logs it and uses success/failure to pick the next state; it
/// never inspects the concrete type.
pub type RunnerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A long-lived unit of user work driven through Init → Idle → Run → Stop.
///
/// Callbacks take `&self`: a runner is shared with its manager task and any
/// internal state it mutates across callbacks belongs behind its own
/// synchronization (atomics, `Mutex`), the same as any other value shared
/// across tasks.
#[async_trait]
pub trait ServiceRunner: Send + Sync + 'static {
    /// Acquire or verify resources. An error skips Idle and Run for this
    /// cycle and moves straight to Stop.
    async fn init(&self, ctx: &ServiceContext) -> Result<(), RunnerError>;

    /// Wait for readiness (dependencies, warm-up). An error skips Run.
    async fn idle(&self, ctx: &ServiceContext) -> Result<(), RunnerError>;

    /// The service's main work. Always followed by Stop, error or not.
    async fn run(&self, ctx: &ServiceContext) -> Result<(), RunnerError>;

    /// Release per-cycle resources. Runs exactly once per cycle that reached
    /// Idle or Run, and once more before exit if the cycle was interrupted.
    async fn stop(&self, ctx: &ServiceContext) -> Result<(), RunnerError>;
}

#[async_trait]
impl<T: ServiceRunner + ?Sized> ServiceRunner for Arc<T> {
    async fn init(&self, ctx: &ServiceContext) -> Result<(), RunnerError> {
        (**self).init(ctx).await
    }

    async fn idle(&self, ctx: &ServiceContext) -> Result<(), RunnerError> {
        (**self).idle(ctx).await
    }

    async fn run(&self, ctx: &ServiceContext) -> Result<(), RunnerError> {
        (**self).run(ctx).await
    }

    async fn stop(&self, ctx: &ServiceContext) -> Result<(), RunnerError> {
        (**self).stop(ctx).await
    }
}
