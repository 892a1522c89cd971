//! OS signal handling for daemon shutdown.
//!
//! The daemon waits on a configurable set of termination signals; receiving
//! any of them starts the shutdown sequence. Non-unix platforms fall back to
//! ctrl-c regardless of the configured set.

/// Portable selector for the OS signals a daemon listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsSignal {
    /// SIGINT (ctrl-c in a terminal).
    Interrupt,
    /// SIGTERM (default kill signal; systemd, Kubernetes).
    Terminate,
    /// SIGQUIT.
    Quit,
    /// SIGHUP.
    Hangup,
}

/// Waits until any of the given signals is received.
///
/// Each call registers fresh listeners. An empty set never resolves.
#[cfg(unix)]
pub(crate) async fn wait_for_signal(signals: &[OsSignal]) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut listeners = Vec::with_capacity(signals.len());
    for sig in signals {
        let kind = match sig {
            OsSignal::Interrupt => SignalKind::interrupt(),
            OsSignal::Terminate => SignalKind::terminate(),
            OsSignal::Quit => SignalKind::quit(),
            OsSignal::Hangup => SignalKind::hangup(),
        };
        listeners.push(signal(kind)?);
    }

    if listeners.is_empty() {
        std::future::pending::<()>().await;
        return Ok(());
    }

    let waits = listeners.iter_mut().map(|listener| Box::pin(listener.recv()));
    futures::future::select_all(waits).await;
    Ok(())
}

/// Waits for ctrl-c; per-signal configuration is unix-only.
#[cfg(not(unix))]
pub(crate) async fn wait_for_signal(_signals: &[OsSignal]) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
