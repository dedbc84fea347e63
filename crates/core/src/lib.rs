//! harbinger core library.
//!
//! Conflict detection and resolution for a repository monitor: the git
//! adapter and ref-name validation, the non-destructive merge simulator,
//! the conflict marker parser, the interactive resolution session, sync
//! evaluation, the monitor tick, configuration and notifications.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod monitor;
pub mod notify;
pub mod sync;

// Re-exports for convenience.
pub use config::HarbingerConfig;
pub use conflict::{Conflict, ConflictSource, MergeSimulator, ResolutionSession};
pub use git::{GitRepository, RefStore};
pub use monitor::{Monitor, TickReport};
pub use notify::{Notification, Notifier};
pub use sync::{SyncEvaluator, SyncState};
