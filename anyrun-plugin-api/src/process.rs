//! Launching programs from plugin actions

use crate::error::PluginError;
use std::process::{Command, Stdio};

/// Start `command` detached from the launcher's stdio and return its pid.
///
/// A background thread waits on the child, so it is reaped when it exits
/// instead of lingering as a zombie of the launcher.
pub fn spawn_detached(command: &mut Command) -> Result<u32, PluginError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let pid = child.id();

    std::thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || {
            if let Err(e) = child.wait() {
                tracing::warn!(pid, error = %e, "Failed to reap launched program");
            }
        })?;

    Ok(pid)
}
