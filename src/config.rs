//! Daemon-level configuration.
//!
//! [`DaemonConfig`] covers the supervisor's own knobs. Per-service behavior
//! lives on [`Service`](crate::Service) (policy, manager) and per-manager
//! timing on [`RunContinuousManager`](crate::RunContinuousManager).
//!
//! # Example
//! ```
//! use servisor::{DaemonConfig, OsSignal};
//!
//! let mut cfg = DaemonConfig::default();
//! cfg.report_alive_secs = 30;
//! cfg.signals = vec![OsSignal::Interrupt, OsSignal::Terminate, OsSignal::Quit];
//!
//! assert_eq!(cfg.log_capacity, 256);
//! ```

use crate::core::OsSignal;

/// Configuration for the daemon supervisor.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Capacity of the bounded log channel. Producers drop records once it
    /// is full rather than blocking a service.
    pub log_capacity: usize,
    /// Interval in seconds for `Alive` notifications to the system notifier.
    /// Zero disables alive reporting.
    pub report_alive_secs: u64,
    /// OS signals that trigger shutdown.
    pub signals: Vec<OsSignal>,
}

impl Default for DaemonConfig {
    /// Provides a default configuration:
    /// - `log_capacity = 256`
    /// - `report_alive_secs = 0` (disabled)
    /// - `signals = [Interrupt, Terminate]`
    fn default() -> Self {
        Self {
            log_capacity: 256,
            report_alive_secs: 0,
            signals: vec![OsSignal::Interrupt, OsSignal::Terminate],
        }
    }
}
