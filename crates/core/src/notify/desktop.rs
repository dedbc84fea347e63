//! Desktop notification delivery through the platform's own helper tools.

use std::process::Command;

use tracing::debug;

use super::Notification;
use crate::errors::NotificationError;

/// Which helper program delivers notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopBackend {
    /// macOS `osascript`.
    AppleScript,
    /// `notify-send` on Linux desktops.
    NotifySend,
    /// `powershell.exe` reached from inside WSL.
    Wsl,
    /// `powershell` toast on Windows.
    WindowsToast,
}

#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    backend: DesktopBackend,
}

impl DesktopNotifier {
    pub fn new(backend: DesktopBackend) -> Self {
        Self { backend }
    }

    /// Pick a backend for the running platform, if any is usable.
    pub fn detect() -> Option<Self> {
        let backend = if cfg!(target_os = "macos") {
            Some(DesktopBackend::AppleScript)
        } else if cfg!(target_os = "windows") {
            Some(DesktopBackend::WindowsToast)
        } else if cfg!(target_os = "linux") {
            let proc_version = std::fs::read_to_string("/proc/version").unwrap_or_default();
            if is_wsl(&proc_version) {
                Some(DesktopBackend::Wsl)
            } else if which::which("notify-send").is_ok() {
                Some(DesktopBackend::NotifySend)
            } else {
                None
            }
        } else {
            None
        };
        backend.map(Self::new)
    }

    pub fn backend(&self) -> DesktopBackend {
        self.backend
    }

    pub fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        let (program, args) = command_for(self.backend, notification);
        debug!(program, "sending desktop notification");

        let output = Command::new(program)
            .args(&args)
            .output()
            .map_err(|source| NotificationError::Spawn {
                program: program.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(NotificationError::CommandFailed {
                program: program.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Whether a `/proc/version` string belongs to a WSL kernel.
pub fn is_wsl(proc_version: &str) -> bool {
    let lower = proc_version.to_ascii_lowercase();
    lower.contains("microsoft") || lower.contains("wsl")
}

fn command_for(backend: DesktopBackend, n: &Notification) -> (&'static str, Vec<String>) {
    match backend {
        DesktopBackend::AppleScript => {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_escape(&n.message),
                applescript_escape(&n.title)
            );
            ("osascript", vec!["-e".into(), script])
        }
        DesktopBackend::NotifySend => ("notify-send", vec![n.title.clone(), n.message.clone()]),
        DesktopBackend::Wsl => (
            "powershell.exe",
            vec![
                "-NoProfile".into(),
                "-NonInteractive".into(),
                "-Command".into(),
                balloon_script(&n.title, &n.message),
            ],
        ),
        DesktopBackend::WindowsToast => (
            "powershell",
            vec![
                "-NoProfile".into(),
                "-NonInteractive".into(),
                "-Command".into(),
                toast_script(&n.title, &n.message),
            ],
        ),
    }
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// PowerShell single-quoted literal.
fn ps_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn balloon_script(title: &str, message: &str) -> String {
    format!(
        "Add-Type -AssemblyName System.Windows.Forms; \
         Add-Type -AssemblyName System.Drawing; \
         $n = New-Object System.Windows.Forms.NotifyIcon; \
         $n.Icon = [System.Drawing.SystemIcons]::Information; \
         $n.BalloonTipIcon = [System.Windows.Forms.ToolTipIcon]::Info; \
         $n.BalloonTipTitle = {}; \
         $n.BalloonTipText = {}; \
         $n.Visible = $true; \
         $n.ShowBalloonTip(5000); \
         Start-Sleep -Seconds 1; \
         $n.Dispose()",
        ps_quote(title),
        ps_quote(message)
    )
}

fn toast_script(title: &str, message: &str) -> String {
    format!(
        "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null; \
         $t = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
         $x = $t.GetElementsByTagName('text'); \
         $x.Item(0).AppendChild($t.CreateTextNode({})) | Out-Null; \
         $x.Item(1).AppendChild($t.CreateTextNode({})) | Out-Null; \
         $toast = [Windows.UI.Notifications.ToastNotification]::new($t); \
         [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('Harbinger').Show($toast)",
        ps_quote(title),
        ps_quote(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_wsl() {
        assert!(is_wsl(
            "Linux version 5.15.90.1-microsoft-standard-WSL2 (gcc) #1 SMP"
        ));
        assert!(!is_wsl("Linux version 6.5.0-14-generic (buildd@lcy02)"));
        assert!(!is_wsl(""));
    }

    #[test]
    fn test_applescript_quotes_are_escaped() {
        let n = Notification::new("Say \"hi\"", "path\\to");
        let (program, args) = command_for(DesktopBackend::AppleScript, &n);
        assert_eq!(program, "osascript");
        assert_eq!(
            args[1],
            "display notification \"path\\\\to\" with title \"Say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_powershell_literals_are_quoted() {
        assert_eq!(ps_quote("it's"), "'it''s'");
        let n = Notification::new("T", "don't");
        let (program, args) = command_for(DesktopBackend::Wsl, &n);
        assert_eq!(program, "powershell.exe");
        assert!(args[3].contains("'don''t'"));
    }

    #[test]
    fn test_notify_send_args() {
        let n = Notification::in_sync("main");
        let (program, args) = command_for(DesktopBackend::NotifySend, &n);
        assert_eq!(program, "notify-send");
        assert_eq!(args, vec![n.title.clone(), n.message.clone()]);
    }
}
