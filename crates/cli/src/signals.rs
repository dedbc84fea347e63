//! Stop requests for a running monitor.
//!
//! A [`Shutdown`] is shared between the signal listener and the polling
//! loop. The loop only looks at it between repository checks, so a check
//! that is already running always finishes before the monitor exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

#[derive(Debug, Default)]
struct State {
    requested: AtomicBool,
    checking: AtomicBool,
}

/// Cloneable handle to one monitor's stop request.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    state: Arc<State>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// Ask the monitor to stop; `reason` names the signal or caller.
    pub fn request(&self, reason: &str) {
        if self.state.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.is_checking() {
            info!(reason, "stop requested; finishing the current repository check first");
        } else {
            info!(reason, "stop requested");
        }
    }

    /// Whether a repository check is running right now.
    pub fn is_checking(&self) -> bool {
        self.state.checking.load(Ordering::SeqCst)
    }

    /// Mark a repository check as running until the guard drops.
    pub fn begin_check(&self) -> CheckGuard<'_> {
        self.state.checking.store(true, Ordering::SeqCst);
        CheckGuard { shutdown: self }
    }
}

pub struct CheckGuard<'a> {
    shutdown: &'a Shutdown,
}

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.shutdown.state.checking.store(false, Ordering::SeqCst);
    }
}

/// Create a [`Shutdown`] that SIGINT (Ctrl+C) or SIGTERM will trigger.
pub fn setup_signal_handlers() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        if let Some(signal) = wait_for_stop_signal().await {
            handle.request(signal);
        }
    });

    shutdown
}

/// Name of the first stop signal received, or `None` if none can be heard.
async fn wait_for_stop_signal() -> Option<&'static str> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = ctrl_c => Some("SIGINT"),
                    _ = sigterm.recv() => Some("SIGTERM"),
                };
            }
            Err(e) => {
                error!(error = %e, "failed to register SIGTERM handler; only Ctrl+C will stop the monitor");
            }
        }
    }

    match ctrl_c.await {
        Ok(()) => Some("SIGINT"),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl+C");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_guard_tracks_running_check() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_checking());
        {
            let _check = shutdown.begin_check();
            assert!(shutdown.is_checking());
            shutdown.request("test");
        }
        assert!(!shutdown.is_checking());
        assert!(shutdown.is_requested());
    }

    #[test]
    fn test_request_is_shared_between_clones() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        other.request("SIGTERM");
        other.request("SIGINT");
        assert!(shutdown.is_requested());
    }
}
