//! Error types for the harbinger core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from the reference store adapter and the merge simulator.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A ref name failed validation before reaching any git command.
    #[error("invalid ref name '{name}': {reason}")]
    InvalidRefName { name: String, reason: String },

    /// A ref (branch, remote-tracking branch, SHA) could not be resolved.
    #[error("unknown ref: {0}")]
    UnknownRef(String),

    /// The branch has no remote counterpart to compare or pull against.
    #[error("branch '{branch}' has no upstream")]
    NoUpstream { branch: String },

    /// The installed git cannot produce a non-destructive merge preview.
    #[error("merge preview unsupported: {0}")]
    MergePreviewUnsupported(String),

    /// Uncommitted changes in the working tree block the operation.
    #[error("cannot {operation}: uncommitted changes in working directory")]
    UncommittedChanges { operation: String },

    /// A `git` command exited with a non-zero status.
    #[error("git {command} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Errors from the interactive resolution session.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Checking out a side or staging the file failed; the file is still
    /// unresolved.
    #[error("failed to {action} '{path}': {source}")]
    ApplyFailed {
        path: String,
        action: String,
        #[source]
        source: GitError,
    },

    /// No editor was configured, set in the environment, or found on `$PATH`.
    #[error("no editor found: set `editor` in the config or $EDITOR")]
    NoEditorFound,

    /// The editor process could not be started.
    #[error("failed to launch editor '{editor}': {source}")]
    EditorLaunch {
        editor: String,
        #[source]
        source: std::io::Error,
    },

    /// The input source reached end-of-file while a choice was pending.
    #[error("input closed before all conflicts were handled")]
    InputClosed,

    /// Reading from the input source failed.
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),

    /// Scanning the working tree for conflicted files failed.
    #[error("failed to scan for conflicted files")]
    Scan(#[source] GitError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading or writing the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from desktop notification delivery.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The notification helper ran but reported failure.
    #[error("{program} failed: {detail}")]
    CommandFailed { program: String, detail: String },

    /// The notification helper could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
