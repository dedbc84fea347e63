//! External editor resolution and launching.

use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::errors::ResolveError;

/// Editors probed on `PATH`, in order, when nothing is configured.
pub const FALLBACK_EDITORS: &[&str] = &["code", "nano", "vim", "vi", "emacs", "notepad"];

/// Runs an editor on a file and reports whether it exited successfully.
pub trait EditorLauncher {
    /// Block until the editor exits. `Ok(false)` means it ran but failed;
    /// `Err` means it could not be started at all.
    fn launch(&self, editor: &str, path: &Path) -> io::Result<bool>;
}

/// Spawns the editor as a child process sharing this terminal.
///
/// `editor` may carry arguments (`code --wait`); the file path is appended.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandEditorLauncher;

impl EditorLauncher for CommandEditorLauncher {
    fn launch(&self, editor: &str, path: &Path) -> io::Result<bool> {
        let mut parts = editor.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty editor command")
        })?;

        info!(editor = %editor, path = %path.display(), "launching editor");
        let status = Command::new(program).args(parts).arg(path).status()?;
        debug!(?status, "editor exited");
        Ok(status.success())
    }
}

/// Pick the editor command: `configured`, else `$VISUAL`, else `$EDITOR`,
/// else the first of [`FALLBACK_EDITORS`] for which `on_path` holds.
pub fn resolve_editor<E, P>(
    configured: Option<&str>,
    env: E,
    on_path: P,
) -> Result<String, ResolveError>
where
    E: Fn(&str) -> Option<String>,
    P: Fn(&str) -> bool,
{
    let explicit = configured
        .map(str::to_string)
        .into_iter()
        .chain(env("VISUAL"))
        .chain(env("EDITOR"))
        .find(|e| !e.trim().is_empty());
    if let Some(editor) = explicit {
        return Ok(editor.trim().to_string());
    }

    FALLBACK_EDITORS
        .iter()
        .find(|name| on_path(name))
        .map(|name| name.to_string())
        .ok_or(ResolveError::NoEditorFound)
}

/// [`resolve_editor`] against the real process environment and `PATH`.
pub fn find_editor(configured: Option<&str>) -> Result<String, ResolveError> {
    resolve_editor(
        configured,
        |key| std::env::var(key).ok(),
        |name| which::which(name).is_ok(),
    )
}
