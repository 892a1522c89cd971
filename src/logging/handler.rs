//! Log sink trait and the default console sink.
//!
//! The daemon's log consumer task calls [`LogHandler::handle`] for every
//! record it drains. Handlers run on the consumer task: keep them fast, or
//! buffer internally; producers drop records once the channel is full.

use crate::logging::{DaemonLog, Level};

/// Receives every log record drained from the daemon's log channel.
///
/// Implementations decide formatting, filtering and destination. The core
/// never filters on the producer side beyond the bounded channel itself.
pub trait LogHandler: Send + Sync + 'static {
    fn handle(&self, record: DaemonLog);
}

/// Minimal stderr sink with a severity floor.
///
/// Format: `LEVEL message key=value key=value`. Intended for development and
/// small deployments; implement [`LogHandler`] for structured shipping.
pub struct ConsoleLogger {
    min_level: Level,
}

impl ConsoleLogger {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl Default for ConsoleLogger {
    /// Logs at `Info` and more severe.
    fn default() -> Self {
        Self {
            min_level: Level::Info,
        }
    }
}

impl LogHandler for ConsoleLogger {
    fn handle(&self, record: DaemonLog) {
        if !record.level.enabled(self.min_level) {
            return;
        }

        let mut line = format!("{} {}", record.level, record.message);
        for field in &record.fields {
            line.push(' ');
            line.push_str(&field.key);
            line.push('=');
            line.push_str(&field.value);
        }
        eprintln!("{line}");
    }
}
