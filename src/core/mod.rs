//! Runtime core: the daemon supervisor and everything it hands to services.
//!
//! ## Files & responsibilities
//! - **daemon.rs**: [`Daemon`] - owns the log channel, the state topic and the
//!   aggregator; spawns one manager task per service; sequences shutdown.
//! - **manager.rs**: the [`Manager`] seam and the shipped
//!   [`RunContinuousManager`] state machine.
//! - **context.rs**: [`ServiceContext`] - cancellation + logging + state
//!   watching, the one object user callbacks receive.
//! - **signals.rs**: configurable OS signal waiting.
//! - **notify.rs**: the [`SystemNotifier`] interface to an OS service manager.

mod context;
mod daemon;
mod manager;
mod notify;
mod signals;

pub use context::ServiceContext;
pub use daemon::Daemon;
pub use manager::{Manager, ManagerStateTimeouts, RunContinuousManager, StateUpdate, StateUpdater};
pub use notify::{NotifyState, SystemNotifier};
pub use signals::OsSignal;
