//! Error types used by the daemon and the intracom fabric.
//!
//! Two enums cover every failure mode that surfaces as a value:
//!
//! - [`TopicError`] - intracom topic operations (subscribe/unsubscribe/close).
//! - [`DaemonError`] - daemon startup validation and supervisor-level faults.
//!
//! Errors returned from user lifecycle callbacks are opaque
//! ([`RunnerError`](crate::services::RunnerError)); they are logged and steer
//! the state machine, never surfaced through these types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by intracom topic operations.
///
/// All of these are recoverable from the caller's point of view: a failed
/// subscribe leaves the service running, a failed unsubscribe means the group
/// was already gone or the topic is shutting down.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TopicError {
    /// The topic has been closed; no further operations are accepted.
    #[error("topic is closed")]
    Closed,

    /// `close` was called on an already-closed topic.
    #[error("topic already closed")]
    AlreadyClosed,

    /// A consumer group with this name already exists and the subscriber
    /// asked for exclusivity.
    #[error("consumer group '{group}' already exists")]
    GroupExists { group: String },

    /// No consumer group with this name is subscribed.
    #[error("consumer group '{group}' is not subscribed")]
    GroupUnknown { group: String },

    /// The broadcaster did not answer a control request in time.
    #[error("topic request timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl TopicError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TopicError::Closed => "topic_closed",
            TopicError::AlreadyClosed => "topic_already_closed",
            TopicError::GroupExists { .. } => "topic_group_exists",
            TopicError::GroupUnknown { .. } => "topic_group_unknown",
            TopicError::Timeout { .. } => "topic_timeout",
        }
    }
}

/// Errors produced by the daemon supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DaemonError {
    /// `run` was called with no services registered.
    #[error("no services to run")]
    NoServices,

    /// A service was registered with an empty name.
    #[error("service name must not be empty")]
    EmptyServiceName,

    /// Two services were registered under the same name.
    #[error("service '{name}' already registered")]
    DuplicateService { name: String },

    /// A manager task panicked outside the per-callback recovery, or the
    /// supervisor itself panicked during startup.
    #[error("supervisor panicked: {reason}")]
    SupervisorPanic { reason: String },

    /// The configured system notifier failed to start.
    #[error("system notifier failed to start: {source}")]
    Notifier {
        #[source]
        source: std::io::Error,
    },
}

impl DaemonError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DaemonError::NoServices => "daemon_no_services",
            DaemonError::EmptyServiceName => "daemon_empty_service_name",
            DaemonError::DuplicateService { .. } => "daemon_duplicate_service",
            DaemonError::SupervisorPanic { .. } => "daemon_supervisor_panic",
            DaemonError::Notifier { .. } => "daemon_notifier",
        }
    }
}
