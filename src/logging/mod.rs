//! Structured logging for the daemon and its services.
//!
//! The core never writes to a sink directly. Services and the daemon emit
//! [`DaemonLog`] records into a bounded channel; a single consumer task hands
//! each record to an opaque [`LogHandler`]. Producers use non-blocking sends,
//! so a slow or wedged sink degrades to dropped records instead of stalling a
//! service manager.
//!
//! ## Contents
//! - [`Level`] - severity ladder (Emergency..Debug, RFC 5424 ordering)
//! - [`Field`] - string key/value pair attached to records
//! - [`DaemonLog`] - one immutable log record
//! - [`LogHandler`] - the sink trait; [`ConsoleLogger`] is the shipped default

mod field;
mod handler;
mod level;

pub use field::{DaemonLog, Field};
pub use handler::{ConsoleLogger, LogHandler};
pub use level::Level;
