//! Child process execution with time and output bounds.
//!
//! Every process is spawned with `kill_on_drop` in a process group of its
//! own, raced against its timeout and the request's cancellation token, and
//! has stdout and stderr each
//! captured up to a byte cap. Output past the cap is drained and dropped so
//! the child never blocks on a full pipe.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alin_core::ToolError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to wait for pipes to close after a kill.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    /// `sh -c <script>` in `cwd`.
    pub fn shell(script: &str, cwd: impl Into<PathBuf>, timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: cwd.into(),
            timeout,
            max_output_bytes,
            env: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text shown to the model: exit status, stdout, then stderr.
    pub fn render(&self, cap: usize) -> String {
        let header = match self.exit_code {
            Some(0) => String::new(),
            Some(code) => format!("[exit code: {code}]\n"),
            None => "[terminated by signal]\n".into(),
        };
        let body = self.streams(cap);
        if body.is_empty() {
            format!("{header}(no output)")
        } else {
            format!("{header}{body}")
        }
    }

    /// stdout and stderr with truncation notices, without the exit status.
    pub fn streams(&self, cap: usize) -> String {
        let mut out = self.stdout.trim_end().to_string();
        if self.stdout_truncated {
            out.push_str(&format!("\n[stdout truncated at {cap} bytes]"));
        }
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() || self.stderr_truncated {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("[stderr]\n");
            out.push_str(stderr);
            if self.stderr_truncated {
                out.push_str(&format!("\n[stderr truncated at {cap} bytes]"));
            }
        }
        out
    }
}

/// Spawns processes for the shell, code and git tools.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion. Timeout becomes `ExecutionTimeout` carrying the
    /// partial output; cancellation becomes `Cancelled`.
    async fn run(&self, spec: ProcessSpec, cancel: &CancellationToken) -> Result<ProcessOutput, ToolError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessRunner;

#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

async fn drain<R: AsyncRead + Unpin>(mut pipe: R, sink: Arc<Mutex<Capture>>, cap: usize) {
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut capture = sink.lock().unwrap_or_else(|p| p.into_inner());
                let room = cap.saturating_sub(capture.bytes.len());
                if n > room {
                    capture.truncated = true;
                }
                let keep = n.min(room);
                capture.bytes.extend_from_slice(&buf[..keep]);
            }
        }
    }
}

fn take(sink: &Arc<Mutex<Capture>>) -> (String, bool) {
    let capture = sink.lock().unwrap_or_else(|p| p.into_inner());
    (String::from_utf8_lossy(&capture.bytes).into_owned(), capture.truncated)
}

/// Kills the child's whole process group unless disarmed, so commands a
/// shell started in the background die with it.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else { return };
        #[cfg(unix)]
        {
            let Ok(pgid) = libc::pid_t::try_from(pgid) else { return };
            // SAFETY: kill(2) takes plain integers; a negative pid targets the group.
            if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
                debug!(pgid, "Process group already gone");
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

enum Outcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, spec: ProcessSpec, cancel: &CancellationToken) -> Result<ProcessOutput, ToolError> {
        debug!(program = %spec.program, args = ?spec.args, cwd = %spec.cwd.display(), "Spawning process");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ToolError::ExecutionFailed(format!("'{}' is not installed or not on PATH", spec.program))
                }
                _ => ToolError::ExecutionFailed(format!("failed to spawn '{}': {e}", spec.program)),
            })?;
        let mut group = GroupGuard::new(child.id());

        let stdout = Arc::new(Mutex::new(Capture::default()));
        let stderr = Arc::new(Mutex::new(Capture::default()));
        let mut readers = Vec::new();
        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(drain(pipe, Arc::clone(&stdout), spec.max_output_bytes)));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(drain(pipe, Arc::clone(&stderr), spec.max_output_bytes)));
        }

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status?),
            _ = tokio::time::sleep(spec.timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        if matches!(outcome, Outcome::Exited(_)) {
            group.disarm();
        } else {
            group.kill();
            if let Err(e) = child.kill().await {
                warn!(error = %e, program = %spec.program, "Failed to kill process");
            }
        }

        for reader in readers {
            // A grandchild may still hold the pipe open; don't wait forever.
            if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
                debug!(program = %spec.program, "Output pipe still open after exit");
            }
        }

        let (stdout, stdout_truncated) = take(&stdout);
        let (stderr, stderr_truncated) = take(&stderr);
        let output = ProcessOutput {
            stdout,
            stderr,
            exit_code: None,
            stdout_truncated,
            stderr_truncated,
        };

        match outcome {
            Outcome::Exited(status) => Ok(ProcessOutput {
                exit_code: status.code(),
                ..output
            }),
            Outcome::TimedOut => {
                warn!(program = %spec.program, timeout_secs = spec.timeout.as_secs(), "Process timed out");
                Err(ToolError::ExecutionTimeout {
                    timeout_secs: spec.timeout.as_secs(),
                    output: output.streams(spec.max_output_bytes),
                })
            }
            Outcome::Cancelled => Err(ToolError::Cancelled),
        }
    }
}
