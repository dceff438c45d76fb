//! Subprocesses that own a process group.
//!
//! Every command is spawned as the leader of a fresh process group. When it
//! finishes, or when its deadline passes, the whole group is signalled so no
//! descendant outlives the step that spawned it.

#[cfg(not(unix))]
compile_error!("judge-core manages process groups and supports unix targets only");

use std::{
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt as _},
    process::Command,
    task::JoinHandle,
    time::Instant,
};

/// Time between SIGTERM and SIGKILL when tearing down a timed-out group.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct GroupOutput {
    /// `None` when the deadline passed.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl GroupOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    pub fn success(&self) -> bool {
        self.status.map_or(false, |s| s.success())
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// `{shell} -c {script}` with stdout and stderr piped.
pub fn shell_command(shell: &Path, script: &str) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(script)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Spawn `cmd` in its own process group and wait for it, at most `deadline` if given.
///
/// Only the leader is timed. Piped output is read alongside and collected once
/// the group is gone, so a background member holding a pipe open cannot extend
/// the run. On expiry the group receives SIGTERM, then SIGKILL after
/// [`KILL_GRACE_PERIOD`]. After a normal exit, any member still alive is killed.
pub async fn run_in_group(mut cmd: Command, deadline: Option<Duration>) -> io::Result<GroupOutput> {
    cmd.process_group(0).kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let pgid = child.id().and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw);
    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));
    let start_at = Instant::now();

    let waited = match deadline {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };
    let elapsed = start_at.elapsed();

    let status = match waited {
        Some(status) => {
            if let Some(pgid) = pgid {
                reap_group(pgid);
            }
            Some(status?)
        }
        None => {
            match pgid {
                Some(pgid) => terminate_group(pgid).await,
                None => child.start_kill()?,
            }
            child.wait().await?;
            None
        }
    };

    Ok(GroupOutput {
        timed_out: status.is_none(),
        status,
        stdout: join_reader(stdout).await?,
        stderr: join_reader(stderr).await?,
        elapsed,
    })
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn join_reader(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Kill leftovers of a group whose leader already exited.
fn reap_group(pgid: Pid) {
    match signal::killpg(pgid, Signal::SIGKILL) {
        Ok(()) => log::debug!("Killed leftover processes in group {}", pgid),
        Err(Errno::ESRCH) => (),
        Err(e) => log::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

async fn terminate_group(pgid: Pid) {
    match signal::killpg(pgid, Signal::SIGTERM) {
        Ok(()) => (),
        Err(Errno::ESRCH) => return,
        Err(e) => log::warn!("Failed to send SIGTERM to process group {}: {}", pgid, e),
    }
    tokio::time::sleep(KILL_GRACE_PERIOD).await;
    reap_group(pgid);
}

#[cfg(test)]
mod test {
    use super::*;

    fn sh(script: &str) -> Command {
        shell_command(Path::new("/bin/sh"), script)
    }

    #[tokio::test]
    async fn captures_output_and_status() {
        let out = run_in_group(sh("echo hello; echo oops >&2; exit 3"), None)
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.exit_code(), Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout_lossy(), "hello\n");
        assert_eq!(out.stderr_lossy(), "oops\n");
    }

    #[tokio::test]
    async fn finishes_before_deadline() {
        let out = run_in_group(sh("echo ok"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert!(out.success());
        assert_eq!(out.stdout_lossy(), "ok\n");
    }

    #[tokio::test]
    async fn deadline_kills_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("alive");
        let script = format!(
            "(sleep 1; echo alive > '{}') & sleep 30",
            marker.to_string_lossy()
        );

        let out = run_in_group(sh(&script), Some(Duration::from_millis(300)))
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.status, None);
        assert!(out.elapsed < Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "a descendant survived the timeout");
    }

    #[tokio::test]
    async fn leftover_background_process_is_killed_after_exit() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("alive");
        let script = format!(
            "(sleep 1; echo alive > '{}') >/dev/null 2>&1 &",
            marker.to_string_lossy()
        );

        let out = run_in_group(sh(&script), None).await.unwrap();
        assert!(out.success());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "a background process outlived its group leader");
    }

    #[tokio::test]
    async fn background_process_keeping_stderr_does_not_delay_exit() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("alive");
        let script = format!(
            "echo done; (sleep 5; echo alive > '{}') &",
            marker.to_string_lossy()
        );

        let start_at = Instant::now();
        let out = run_in_group(sh(&script), Some(Duration::from_secs(3)))
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert!(out.success());
        assert_eq!(out.stdout_lossy(), "done\n");
        assert!(start_at.elapsed() < Duration::from_secs(2));

        let start_at = Instant::now();
        let out = run_in_group(sh(&script), None).await.unwrap();
        assert!(out.success());
        assert!(start_at.elapsed() < Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert!(!marker.exists(), "a background process outlived its group leader");
    }

    #[tokio::test]
    async fn spawn_failure_is_an_io_error() {
        let cmd = Command::new("/nonexistent/judge-test-binary");
        let err = run_in_group(cmd, None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
