//! Stopping an MCP server process: SIGTERM, grace period, SIGKILL.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Stop `child` and reap it.
///
/// On unix the process gets SIGTERM and `grace` to exit before SIGKILL.
/// Elsewhere it is killed immediately.
pub async fn shutdown_child(mut child: Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        terminate_unix(&mut child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn terminate_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // Already reaped
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => return child.wait().await,
        Err(e) => return Err(io::Error::other(e)),
    }

    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }

    debug!(pid, "Child ignored SIGTERM, sending SIGKILL");
    child.kill().await?;
    child.wait().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_sigterm_stops_sleep() {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .spawn()
            .expect("failed to spawn sleep");

        let started = std::time::Instant::now();
        let status = shutdown_child(child, Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_escalates_when_sigterm_ignored() {
        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .expect("failed to spawn sh");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = shutdown_child(child, Duration::from_millis(200)).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_already_exited() {
        let mut child = Command::new("true").spawn().expect("failed to spawn true");
        let _ = child.wait().await;

        assert!(shutdown_child(child, Duration::from_secs(1)).await.is_ok());
    }
}
