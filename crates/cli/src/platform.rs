//! Platform-specific process control for background monitors.
//!
//! Everything that differs between operating systems (detaching a child,
//! checking liveness, asking a process to stop) sits behind
//! [`ProcessControl`]; callers never branch on the platform themselves.

use std::io;
use std::process::Command;
use std::time::Duration;

/// How long a stopped process gets before it is killed outright.
pub const STOP_GRACE: Duration = Duration::from_secs(1);
const STOP_POLL: Duration = Duration::from_millis(100);

pub trait ProcessControl {
    /// Whether a process with `pid` exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask `pid` to exit, forcing it after [`STOP_GRACE`].
    fn send_stop_signal(&self, pid: u32) -> io::Result<()>;

    /// Configure `cmd` so the child outlives this process and its terminal.
    fn set_detached_attributes(&self, cmd: &mut Command);
}

/// Wait up to [`STOP_GRACE`] for `pid` to go away.
fn wait_for_exit<P: ProcessControl + ?Sized>(control: &P, pid: u32) -> bool {
    let mut waited = Duration::ZERO;
    while waited < STOP_GRACE {
        std::thread::sleep(STOP_POLL);
        waited += STOP_POLL;
        if !control.is_alive(pid) {
            return true;
        }
    }
    false
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::process::CommandExt;
    use tracing::{info, warn};

    /// SIGTERM, then SIGKILL; children get their own process group.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct UnixProcessControl;

    fn kill(pid: u32, signal: libc::c_int) -> io::Result<()> {
        // 0 and negative values signal whole process groups.
        let pid = match libc::pid_t::try_from(pid) {
            Ok(pid) if pid > 0 => pid,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("refusing to signal invalid PID {pid}"),
                ))
            }
        };
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    impl ProcessControl for UnixProcessControl {
        fn is_alive(&self, pid: u32) -> bool {
            // Signal 0 doesn't send a signal, just checks if process exists
            kill(pid, 0).is_ok()
        }

        fn send_stop_signal(&self, pid: u32) -> io::Result<()> {
            info!(pid, "sending SIGTERM");
            kill(pid, libc::SIGTERM)?;
            if wait_for_exit(self, pid) {
                return Ok(());
            }
            warn!(pid, "process still running, sending SIGKILL");
            match kill(pid, libc::SIGKILL) {
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
                other => other,
            }
        }

        fn set_detached_attributes(&self, cmd: &mut Command) {
            cmd.process_group(0);
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use std::os::windows::process::CommandExt;
    use std::process::Stdio;
    use tracing::{info, warn};

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

    /// `taskkill`, then `taskkill /F`; children are detached from the console.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsProcessControl;

    fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let pid_arg = pid.to_string();
        let mut args = vec!["/PID", pid_arg.as_str()];
        if force {
            args.push("/F");
        }
        let status = Command::new("taskkill")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("taskkill exited with {status}"),
            ))
        }
    }

    impl ProcessControl for WindowsProcessControl {
        fn is_alive(&self, pid: u32) -> bool {
            Command::new("tasklist")
                .args(["/FI", &format!("PID eq {pid}"), "/NH"])
                .output()
                .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
                .unwrap_or(false)
        }

        fn send_stop_signal(&self, pid: u32) -> io::Result<()> {
            info!(pid, "requesting process exit");
            taskkill(pid, false)?;
            if wait_for_exit(self, pid) {
                return Ok(());
            }
            warn!(pid, "process still running, forcing exit");
            taskkill(pid, true)
        }

        fn set_detached_attributes(&self, cmd: &mut Command) {
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }
    }
}

#[cfg(unix)]
pub use unix::UnixProcessControl as NativeProcessControl;
#[cfg(windows)]
pub use windows::WindowsProcessControl as NativeProcessControl;

/// Process control for the running platform.
pub fn native() -> NativeProcessControl {
    NativeProcessControl
}
