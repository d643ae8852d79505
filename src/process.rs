use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// A line in a child runtime's diagnostic stream matching this pattern
/// carries the inspector's WebSocket endpoint, e.g.
/// `Debugger listening on ws://127.0.0.1:9229/3c1ff97d-...`.
const INSPECTOR_ENDPOINT_PREFIX: &str = "Debugger listening on ";

/// Why the Process Spawner gave up. Mapped to `Error::SessionStartFailed`
/// at the Session Manager boundary (§4.1 is an internal-only failure
/// shape, not part of the outward error taxonomy in §7).
#[derive(Debug)]
pub enum SpawnError {
    /// The child exited before printing an inspector endpoint line.
    ChildExited { code: Option<i32> },
    /// No endpoint line appeared within the configured bound.
    Timeout,
    Io(std::io::Error),
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnError::ChildExited { code } => {
                write!(f, "child exited before inspector was ready (code {code:?})")
            }
            SpawnError::Timeout => write!(f, "timed out waiting for inspector endpoint"),
            SpawnError::Io(e) => write!(f, "io error spawning child: {e}"),
        }
    }
}

impl From<std::io::Error> for SpawnError {
    fn from(e: std::io::Error) -> Self {
        SpawnError::Io(e)
    }
}

/// A child runtime with its inspector endpoint resolved, plus the stdout/
/// stderr handles the caller takes over for output capture.
pub struct SpawnedProcess {
    pub child: Child,
    pub inspector_url: String,
    pub stdout: Option<ChildStdout>,
    pub stderr_tail: Vec<String>,
}

/// Launches a runtime with its inspector enabled and extracts its
/// WebSocket endpoint from its diagnostic stream (§4.1).
pub struct ProcessSpawner {
    pub endpoint_timeout: Duration,
}

impl ProcessSpawner {
    pub fn new(endpoint_timeout: Duration) -> Self {
        Self { endpoint_timeout }
    }

    /// Spawn `command args...` in `cwd`, breaking before the first user
    /// statement with the inspector listening on an ephemeral loopback
    /// port. Never leaves a half-started child behind: any error path
    /// kills the child first.
    pub async fn spawn(
        &self,
        command: &str,
        args: &[String],
        cwd: Option<&str>,
    ) -> Result<SpawnedProcess, SpawnError> {
        let mut cmd = Command::new(command);
        cmd.arg("--inspect-brk=0")
            .arg("--enable-source-maps")
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn()?;
        let stderr = child
            .stderr
            .take()
            .expect("stderr was configured as piped");
        let stdout = child.stdout.take();

        match timeout(self.endpoint_timeout, Self::read_endpoint(&mut child, stderr)).await {
            Ok(Ok((url, tail))) => Ok(SpawnedProcess {
                child,
                inspector_url: url,
                stdout,
                stderr_tail: tail,
            }),
            Ok(Err(e)) => {
                Self::kill(&mut child).await;
                Err(e)
            }
            Err(_) => {
                Self::kill(&mut child).await;
                Err(SpawnError::Timeout)
            }
        }
    }

    async fn read_endpoint(child: &mut Child, stderr: ChildStderr) -> Result<(String, Vec<String>), SpawnError> {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = Vec::new();

        while let Some(line) = lines.next_line().await? {
            debug!("child diagnostic: {}", line);
            if let Some(url) = line.strip_prefix(INSPECTOR_ENDPOINT_PREFIX) {
                return Ok((url.trim().to_string(), tail));
            }
            tail.push(line);
            if tail.len() > 50 {
                tail.remove(0);
            }
        }

        let code = child.wait().await.ok().and_then(|status| status.code());
        Err(SpawnError::ChildExited { code })
    }

    async fn kill(child: &mut Child) {
        if let Err(e) = child.kill().await {
            warn!("failed to kill child after spawn error: {}", e);
        }
        let _ = child.wait().await;
    }
}
