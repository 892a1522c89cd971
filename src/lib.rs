//! # servisor
//!
//! **Servisor** is a reactive service daemon framework: a process-level
//! supervisor that runs a set of long-lived services, drives each through a
//! fixed lifecycle state machine under a pluggable run policy, and lets
//! services observe one another's state transitions through a typed
//! intra-process pub/sub fabric.
//!
//! ## Features
//!
//! | Area          | Description                                                         | Key types / traits                          |
//! |---------------|---------------------------------------------------------------------|---------------------------------------------|
//! | **Lifecycle** | Drive services through Init → Idle → Run → Stop → Exit.             | [`ServiceRunner`], [`Manager`], [`RunContinuousManager`] |
//! | **Policies**  | Decide what happens after one pass through Run.                     | [`RunPolicy`]                               |
//! | **Intracom**  | Typed broadcast topics with named consumer groups and drop policies.| [`Topic`], [`Subscription`], [`BufferPolicy`] |
//! | **Watching**  | Filtered streams of every service's state snapshot.                 | [`ServiceContext`], [`ServiceFilter`]       |
//! | **Logging**   | Structured records through a bounded channel to an opaque sink.     | [`DaemonLog`], [`LogHandler`], [`Level`]    |
//! | **Daemon**    | Supervision, OS signals, system-notifier integration, shutdown.     | [`Daemon`], [`DaemonConfig`], [`SystemNotifier`] |
//!
//! ```no_run
//! use std::time::Duration;
//! use servisor::{
//!     ConsoleLogger, Daemon, DaemonConfig, Level, RunnerError, Service, ServiceContext,
//!     ServiceRunner,
//! };
//!
//! struct HelloWorld;
//!
//! #[async_trait::async_trait]
//! impl ServiceRunner for HelloWorld {
//!     async fn init(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
//!         Ok(())
//!     }
//!
//!     async fn idle(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
//!         Ok(())
//!     }
//!
//!     async fn run(&self, ctx: &ServiceContext) -> Result<(), RunnerError> {
//!         while !ctx.is_cancelled() {
//!             ctx.log(Level::Info, "hello world");
//!             tokio::select! {
//!                 _ = ctx.cancelled() => break,
//!                 _ = tokio::time::sleep(Duration::from_secs(1)) => {}
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     async fn stop(&self, _ctx: &ServiceContext) -> Result<(), RunnerError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let daemon = Daemon::new(DaemonConfig::default(), ConsoleLogger::default());
//!     daemon.run(vec![Service::new("hello-world", HelloWorld)]).await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod error;

pub mod core;
pub mod intracom;
pub mod logging;
pub mod services;

// ---- Public re-exports ----

pub use config::DaemonConfig;
pub use crate::core::{
    Daemon, Manager, ManagerStateTimeouts, NotifyState, OsSignal, RunContinuousManager,
    ServiceContext, StateUpdate, StateUpdater, SystemNotifier,
};
pub use error::{DaemonError, TopicError};
pub use intracom::{BufferPolicy, SubscriberConfig, Subscription, Topic, TopicConfig};
pub use logging::{ConsoleLogger, DaemonLog, Field, Level, LogHandler};
pub use services::{
    DaemonService, FilterMode, RunPolicy, RunnerError, Service, ServiceAction, ServiceFilter,
    ServiceRunner, ServiceStates, State,
};
