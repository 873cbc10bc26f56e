//! Process-based runtime

use crate::error::SandboxError;
use crate::execution::{ExecutionPhase, PhaseTracker};
use crate::types::{CommandSpec, RawResult};
use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long to wait for output pipes to close once the process is gone
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

type CaptureBuffer = Arc<Mutex<Vec<u8>>>;

/// A reader task plus the buffer it fills, readable even if the task never ends
struct Drain {
    buffer: CaptureBuffer,
    task: JoinHandle<io::Result<()>>,
}

impl Drain {
    fn spawn<R>(reader: R, limit: Option<usize>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = CaptureBuffer::default();
        let task = tokio::spawn(drain(reader, limit, buffer.clone()));
        Self { buffer, task }
    }

    /// Wait for EOF until `deadline`, then take whatever has been captured
    async fn collect(self, deadline: tokio::time::Instant, stream: &str) -> io::Result<String> {
        let Drain { buffer, mut task } = self;
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(e)) => return Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
            Err(_) => {
                tracing::warn!(
                    stream,
                    "Output pipe still open after grace period, keeping partial output"
                );
                task.abort();
            }
        }
        let bytes = std::mem::take(&mut *lock(&buffer));
        Ok(join_lines(&bytes))
    }
}

async fn collect(
    drain: Option<Drain>,
    deadline: tokio::time::Instant,
    stream: &str,
) -> io::Result<String> {
    match drain {
        Some(drain) => drain.collect(deadline, stream).await,
        None => Ok(String::new()),
    }
}

fn lock(buffer: &CaptureBuffer) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum WaitOutcome {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs commands as child processes, one process group per run on Unix
#[derive(Debug, Clone)]
pub struct ProcessRuntime {
    drain_grace: Duration,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    fn build_command(spec: &CommandSpec, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.work_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            // New group so a timeout can take down grandchildren too
            cmd.process_group(0);
            if let Some(mb) = spec.memory_limit_mb {
                apply_memory_limit(&mut cmd, mb);
            }
        }

        cmd
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Runtime for ProcessRuntime {
    async fn run(&self, spec: CommandSpec) -> Result<RawResult, SandboxError> {
        let (program, args) = spec
            .tokens
            .split_first()
            .ok_or_else(|| SandboxError::InvalidCommand("command has no tokens".to_string()))?;
        if program.trim().is_empty() {
            return Err(SandboxError::InvalidCommand(
                "program name is empty".to_string(),
            ));
        }

        let mut phase = PhaseTracker::new();
        let started = Instant::now();

        let mut child = match Self::build_command(&spec, program, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                phase.advance(ExecutionPhase::SpawnFailed);
                tracing::warn!(command = %spec.display(), error = %e, "Failed to spawn process");
                return Ok(RawResult::spawn_failed(format!(
                    "Failed to start process '{}': {}",
                    program, e
                )));
            }
        };
        phase.advance(ExecutionPhase::Spawned);
        tracing::debug!(pid = ?child.id(), command = %spec.display(), "Process spawned");

        // Both drains must be running before we wait, or a full pipe blocks the child
        let stdout_drain = child
            .stdout
            .take()
            .map(|out| Drain::spawn(out, spec.capture_limit));
        let stderr_drain = child
            .stderr
            .take()
            .map(|err| Drain::spawn(err, spec.capture_limit));

        let cancel = spec.cancel.clone().unwrap_or_else(CancellationToken::new);
        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = tokio::time::sleep(spec.timeout) => WaitOutcome::TimedOut,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        };
        // Killing, reaping and draining all share one grace period
        let deadline = tokio::time::Instant::now() + self.drain_grace;

        let mut exit_code = -1;
        let mut failure: Option<String> = None;
        let mut terminated: Option<String> = None;

        match outcome {
            WaitOutcome::Exited(Ok(status)) => {
                phase.advance(ExecutionPhase::Completed);
                // Signal termination has no code
                exit_code = status.code().unwrap_or(-1);
            }
            WaitOutcome::Exited(Err(e)) => {
                phase.advance(ExecutionPhase::Completed);
                failure = Some(format!("Failed to wait for process: {}", e));
            }
            WaitOutcome::TimedOut => {
                phase.advance(ExecutionPhase::TimedOut);
                tracing::warn!(
                    command = %spec.display(),
                    timeout_ms = spec.timeout.as_millis() as u64,
                    "Process timed out, terminating"
                );
                self.terminate(&mut child, deadline).await;
                terminated = Some(format!(
                    "timeout: execution exceeded {:?} and was terminated",
                    spec.timeout
                ));
            }
            WaitOutcome::Cancelled => {
                phase.advance(ExecutionPhase::Cancelled);
                tracing::info!(command = %spec.display(), "Process cancelled, terminating");
                self.terminate(&mut child, deadline).await;
                terminated =
                    Some("timeout: execution was cancelled before completion".to_string());
            }
        }

        let (stdout, stderr) = tokio::join!(
            collect(stdout_drain, deadline, "stdout"),
            collect(stderr_drain, deadline, "stderr"),
        );

        let (stdout, mut stderr) = match (stdout, stderr) {
            (Ok(out), Ok(err)) => (out, err),
            (Err(e), _) | (_, Err(e)) => {
                failure.get_or_insert_with(|| format!("Failed to read process output: {}", e));
                (String::new(), String::new())
            }
        };

        if let Some(message) = failure {
            exit_code = -1;
            stderr = message;
        }
        if let Some(line) = terminated {
            exit_code = -1;
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&line);
        }

        let timed_out = phase.phase() == ExecutionPhase::TimedOut;
        tracing::debug!(
            exit_code,
            phase = %phase.phase(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Process finished"
        );

        Ok(RawResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            phase: phase.phase(),
        })
    }

    fn name(&self) -> &str {
        "process"
    }
}

impl ProcessRuntime {
    /// Kill the process group and the child, then reap it
    async fn terminate(&self, child: &mut Child, deadline: tokio::time::Instant) {
        if let Err(e) = kill_process_group(child) {
            tracing::warn!(error = %e, "Failed to kill process group");
        }
        if let Err(e) = child.start_kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                tracing::warn!(error = %e, "Failed to kill process");
            }
        }
        if tokio::time::timeout_at(deadline, child.wait())
            .await
            .is_err()
        {
            tracing::warn!(pid = ?child.id(), "Process did not exit after kill");
        }
    }
}

/// Read a stream to EOF into `buffer`, keeping at most `limit` bytes
async fn drain<R>(mut reader: R, limit: Option<usize>, buffer: CaptureBuffer) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = lock(&buffer);
        let room = match limit {
            Some(limit) => limit.saturating_sub(captured.len()).min(n),
            None => n,
        };
        // Past the limit we keep reading so the child never blocks on a full pipe
        captured.extend_from_slice(&chunk[..room]);
    }
}

/// Decode output and join its lines with `\n`
fn join_lines(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(unix)]
fn kill_process_group(child: &Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // The child leads its own group, so its pid is the group id
    let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_process_group(_: &Child) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn apply_memory_limit(cmd: &mut Command, mb: u64) {
    let bytes = mb.saturating_mul(1024 * 1024) as libc::rlim_t;
    unsafe {
        cmd.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: bytes,
                rlim_max: bytes,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &limit) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
