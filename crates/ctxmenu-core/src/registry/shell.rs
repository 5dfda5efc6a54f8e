//! Explorer restart
//!
//! Menu-style changes only show after Explorer reloads. Restarting it is a
//! visible, destructive side effect, so it sits behind [`ShellRestarter`] and
//! only runs when a caller asks for it.

use std::io;
use std::process::Command;

/// Restarts the desktop shell
#[cfg_attr(test, mockall::automock)]
pub trait ShellRestarter: Send + Sync {
    /// Terminate and relaunch the shell; blocks until the kill completes
    ///
    /// # Errors
    /// Returns the process spawn error.
    fn restart(&self) -> io::Result<()>;
}

/// Restarts `explorer.exe` through `taskkill`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplorerRestarter;

impl ShellRestarter for ExplorerRestarter {
    fn restart(&self) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(["/f", "/im", "explorer.exe"])
            .output()?
            .status;
        if !status.success() {
            tracing::warn!(?status, "taskkill did not stop explorer.exe");
        }
        Command::new("explorer.exe").spawn()?;
        Ok(())
    }
}
