//! Run policies for managed services.
//!
//! [`RunPolicy`] governs what happens after one pass through `Run`:
//!
//! - [`RunPolicy::UntilStopped`] loop the lifecycle until shutdown (default).
//! - [`RunPolicy::OnceIfSuccess`] loop until one `Run` succeeds and its
//!   `Stop` succeeds, then exit.
//! - [`RunPolicy::OnceUnbiased`] exit after the first `Run`, success or not.

/// Policy controlling when a service's lifecycle loop ends on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPolicy {
    /// Keep cycling Init → Idle → Run → Stop until the context is cancelled.
    #[default]
    UntilStopped,
    /// Retry the cycle until a `Run` completes without error and the
    /// following `Stop` succeeds, then exit.
    OnceIfSuccess,
    /// Exit after a single `Run`, regardless of its outcome.
    OnceUnbiased,
}

impl RunPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPolicy::UntilStopped => "until_stopped",
            RunPolicy::OnceIfSuccess => "run_once_success",
            RunPolicy::OnceUnbiased => "run_once_unbiased",
        }
    }
}

impl std::fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
