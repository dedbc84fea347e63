//! Notification subsystem for sync and conflict alerts.
//!
//! The [`Notifier`] facade logs every message and forwards it to the desktop
//! channel when one is enabled. Delivery failures are logged, never returned.

pub mod desktop;

use tracing::{info, warn};

pub use desktop::{DesktopBackend, DesktopNotifier};

/// A titled message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn remote_change(branch: &str, commit: &str) -> Self {
        Self::new(
            "Remote Branch Updated",
            format!(
                "Branch '{branch}' has new commits on remote\nLatest: {}",
                short_sha(commit)
            ),
        )
    }

    pub fn out_of_sync(branch: &str, local: &str, remote: &str) -> Self {
        Self::new(
            "Branch Out of Sync",
            format!(
                "Branch '{branch}' is out of sync\nLocal: {}\nRemote: {}",
                short_sha(local),
                short_sha(remote)
            ),
        )
    }

    pub fn conflicts(count: usize) -> Self {
        Self::new(
            "Merge Conflicts Detected",
            format!("Found {count} potential merge conflicts that need resolution"),
        )
    }

    pub fn in_sync(branch: &str) -> Self {
        Self::new(
            "Branch In Sync",
            format!("Branch '{branch}' is up to date with remote"),
        )
    }

    pub fn auto_pull(branch: &str, commits: usize) -> Self {
        Self::new(
            "Auto-Pull Completed",
            format!("Pulled {commits} commit(s) into branch '{branch}'"),
        )
    }

    pub fn behind_remote(branch: &str, commits: usize) -> Self {
        Self::new(
            "Branch Behind Remote",
            format!("Branch '{branch}' is {commits} commit(s) behind remote"),
        )
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Dispatches notifications to the enabled channels.
#[derive(Debug, Default)]
pub struct Notifier {
    desktop: Option<DesktopNotifier>,
}

impl Notifier {
    /// Build a notifier; desktop delivery is probed only when `enabled`.
    pub fn new(enabled: bool) -> Self {
        let desktop = if enabled {
            let detected = DesktopNotifier::detect();
            match &detected {
                Some(d) => info!(backend = ?d.backend(), "desktop notifications enabled"),
                None => info!("no desktop notification backend available"),
            }
            detected
        } else {
            None
        };
        Self { desktop }
    }

    /// A notifier that only logs.
    pub fn disabled() -> Self {
        Self { desktop: None }
    }

    pub fn has_desktop(&self) -> bool {
        self.desktop.is_some()
    }

    pub fn notify(&self, notification: &Notification) {
        info!(
            title = %notification.title,
            message = %notification.message.replace('\n', " | "),
            "notification"
        );
        if let Some(ref desktop) = self.desktop {
            if let Err(e) = desktop.send(notification) {
                warn!(error = %e, "desktop notification failed");
            }
        }
    }
}
