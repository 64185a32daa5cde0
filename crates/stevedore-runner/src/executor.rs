use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::ExecError;
use crate::spec::CommandSpec;

// ============================================================================
// ProcessExecutor - Buffered & Streaming Execution
// ============================================================================

/// Fully collected output of a successful buffered execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the invocation produced any stderr output. Passed to parse
    /// functions alongside stdout.
    #[must_use]
    pub fn had_stderr(&self) -> bool {
        !self.stderr.is_empty()
    }
}

/// Which pipe a streamed line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// One decoded line of streamed output, tagged with its source pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub content: String,
    pub source: StdStream,
}

impl OutputLine {
    #[must_use]
    pub fn is_stderr(&self) -> bool {
        self.source == StdStream::Stderr
    }
}

/// A finite, forward-only, non-restartable sequence of output lines.
///
/// Consuming the sequence to completion is equivalent to waiting for
/// process exit: a nonzero exit surfaces as a terminal
/// [`ExecError::ExitCode`] item, cancellation as [`ExecError::Cancelled`].
/// Dropping the stream terminates the underlying process.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<Result<OutputLine, ExecError>>,
}

impl OutputStream {
    /// Next line, or `None` once the process has exited and all output has
    /// been delivered.
    pub async fn next(&mut self) -> Option<Result<OutputLine, ExecError>> {
        self.rx.recv().await
    }
}

/// Spawns external runtime commands.
///
/// Both modes share the same spawn semantics: argv-style invocation from a
/// [`CommandSpec`], stdin closed, stdout/stderr piped, inherited
/// environment with the spec's entries layered on top.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run to completion and collect both streams.
    ///
    /// Exit code 0 yields the captured output; a nonzero exit fails with
    /// [`ExecError::ExitCode`] carrying the code and both streams.
    /// Cancelling `token` terminates the child and fails with
    /// [`ExecError::Cancelled`].
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        token: &CancellationToken,
    ) -> Result<ProcessOutput, ExecError> {
        let program = spec.program.to_string_lossy().to_string();
        let mut child = spawn(spec, &program)?;
        let pid = child.id();

        let mut stdout_pipe = take_pipe(child.stdout.take(), "stdout")?;
        let mut stderr_pipe = take_pipe(child.stderr.take(), "stderr")?;

        let read_fut = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let (out_res, err_res) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
            );
            out_res?;
            err_res?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout, stderr, status))
        };
        tokio::pin!(read_fut);

        let (stdout, stderr, status) = tokio::select! {
            result = &mut read_fut => result?,
            () = token.cancelled() => {
                debug!(program = %program, "cancelling buffered execution");
                terminate(pid);
                // Reap the child so nothing is orphaned
                let _ = read_fut.await;
                return Err(ExecError::Cancelled);
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        if status.success() {
            Ok(ProcessOutput { stdout, stderr })
        } else if token.is_cancelled() {
            // The kill raced process exit; report the cancellation
            Err(ExecError::Cancelled)
        } else {
            Err(ExecError::ExitCode {
                program,
                code: status.code().unwrap_or(-1),
                stdout,
                stderr,
            })
        }
    }

    /// Spawn and expose output as a lazy line stream.
    ///
    /// The child is spawned immediately (spawn failures are synchronous);
    /// output is delivered incrementally as it arrives, stdout and stderr
    /// interleaved and tagged. Must be called within a tokio runtime.
    pub fn stream(
        &self,
        spec: &CommandSpec,
        token: &CancellationToken,
    ) -> Result<OutputStream, ExecError> {
        let program = spec.program.to_string_lossy().to_string();
        let mut child = spawn(spec, &program)?;
        let pid = child.id();

        let stdout_pipe = take_pipe(child.stdout.take(), "stdout")?;
        let stderr_pipe = take_pipe(child.stderr.take(), "stderr")?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(pump_output(
            child,
            stdout_pipe,
            stderr_pipe,
            tx,
            token.clone(),
            pid,
            program,
        ));

        Ok(OutputStream { rx })
    }
}

fn spawn(spec: &CommandSpec, program: &str) -> Result<Child, ExecError> {
    let mut cmd = spec.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })
}

fn take_pipe<P>(pipe: Option<P>, name: &str) -> Result<P, ExecError> {
    pipe.ok_or_else(|| ExecError::Io(std::io::Error::other(format!("{name} pipe unavailable"))))
}

/// Forcibly terminate a child by pid. Killing by pid rather than through
/// the `Child` handle lets the cancellation path run while the reading
/// future still holds the handle.
fn terminate(pid: Option<u32>) {
    let Some(pid) = pid else { return };

    #[cfg(unix)]
    // SAFETY: plain syscall on a pid we spawned and have not yet reaped
    unsafe {
        libc::kill(pid as i32, libc::SIGKILL);
    }

    #[cfg(windows)]
    {
        let _ = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
    }
}

async fn pump_output(
    mut child: Child,
    stdout_pipe: tokio::process::ChildStdout,
    stderr_pipe: tokio::process::ChildStderr,
    tx: mpsc::Sender<Result<OutputLine, ExecError>>,
    token: CancellationToken,
    pid: Option<u32>,
    program: String,
) {
    let mut out_lines = BufReader::new(stdout_pipe).lines();
    let mut err_lines = BufReader::new(stderr_pipe).lines();
    let mut out_open = true;
    let mut err_open = true;
    let mut cancelled = false;

    while out_open || err_open {
        tokio::select! {
            line = out_lines.next_line(), if out_open => {
                match forward(line, StdStream::Stdout, &tx).await {
                    Forward::Sent => {}
                    Forward::Eof => out_open = false,
                    Forward::ConsumerGone => {
                        cancelled = true;
                        terminate(pid);
                        break;
                    }
                }
            }
            line = err_lines.next_line(), if err_open => {
                match forward(line, StdStream::Stderr, &tx).await {
                    Forward::Sent => {}
                    Forward::Eof => err_open = false,
                    Forward::ConsumerGone => {
                        cancelled = true;
                        terminate(pid);
                        break;
                    }
                }
            }
            () = token.cancelled(), if !cancelled => {
                debug!(program = %program, "cancelling streamed execution");
                cancelled = true;
                terminate(pid);
                // Keep draining; the pipes close once the child dies
            }
            () = tx.closed() => {
                // The consumer dropped the stream; a quiet child would
                // otherwise run to natural exit before the next send fails
                debug!(program = %program, "output stream dropped; terminating child");
                cancelled = true;
                terminate(pid);
                break;
            }
        }
    }

    let status = child.wait().await;

    if cancelled || token.is_cancelled() {
        let _ = tx.send(Err(ExecError::Cancelled)).await;
        return;
    }

    match status {
        Ok(status) if !status.success() => {
            // Streamed output was already delivered incrementally, so the
            // terminal error carries only the exit code
            let _ = tx
                .send(Err(ExecError::ExitCode {
                    program,
                    code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                    stderr: String::new(),
                }))
                .await;
        }
        Err(err) => {
            let _ = tx.send(Err(ExecError::Io(err))).await;
        }
        Ok(_) => {}
    }
}

enum Forward {
    Sent,
    Eof,
    ConsumerGone,
}

async fn forward(
    line: std::io::Result<Option<String>>,
    source: StdStream,
    tx: &mpsc::Sender<Result<OutputLine, ExecError>>,
) -> Forward {
    match line {
        Ok(Some(content)) => {
            if tx.send(Ok(OutputLine { content, source })).await.is_err() {
                Forward::ConsumerGone
            } else {
                Forward::Sent
            }
        }
        Ok(None) => Forward::Eof,
        Err(err) => {
            let _ = tx.send(Err(ExecError::Io(err))).await;
            Forward::Eof
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    // ========================================================================
    // Buffered Execution
    // ========================================================================

    #[tokio::test]
    async fn test_execute_success_captures_stdout() {
        let executor = ProcessExecutor::new();
        let output = executor
            .execute(&sh("echo hello world"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello world");
        assert!(!output.had_stderr());
    }

    #[tokio::test]
    async fn test_execute_captures_stderr_on_success() {
        let executor = ProcessExecutor::new();
        let output = executor
            .execute(&sh("echo warn >&2; echo ok"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "ok");
        assert_eq!(output.stderr.trim(), "warn");
        assert!(output.had_stderr());
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit_carries_both_streams() {
        let executor = ProcessExecutor::new();
        let err = executor
            .execute(&sh("echo out; echo err >&2; exit 42"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ExecError::ExitCode {
                code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(code, 42);
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            other => panic!("expected ExitCode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_spawn_failure() {
        let executor = ProcessExecutor::new();
        let err = executor
            .execute(
                &CommandSpec::new("stevedore_test_no_such_program_404"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_execute_env_override() {
        let executor = ProcessExecutor::new();
        let spec = sh("printf '%s' \"$STEVEDORE_TEST_VAR\"").env("STEVEDORE_TEST_VAR", "layered");
        let output = executor
            .execute(&spec, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout, "layered");
    }

    #[tokio::test]
    async fn test_execute_cwd_override() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ProcessExecutor::new();
        let spec = sh("pwd").cwd(dir.path());
        let output = executor
            .execute(&spec, &CancellationToken::new())
            .await
            .unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[tokio::test]
    async fn test_execute_cancellation_terminates_child() {
        let executor = ProcessExecutor::new();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = executor.execute(&sh("sleep 30"), &token).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "cancellation must not wait for natural exit"
        );
    }

    #[tokio::test]
    async fn test_execute_deadline_cancels() {
        let executor = ProcessExecutor::new();
        let token = CancellationToken::new().with_deadline(Duration::from_millis(80));
        let started = Instant::now();
        let err = executor.execute(&sh("sleep 30"), &token).await.unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    // ========================================================================
    // Streaming Execution
    // ========================================================================

    #[tokio::test]
    async fn test_stream_interleaves_tagged_lines() {
        let executor = ProcessExecutor::new();
        let mut stream = executor
            .stream(&sh("echo one; echo two >&2; echo three"), &CancellationToken::new())
            .unwrap();

        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        while let Some(item) = stream.next().await {
            let line = item.unwrap();
            match line.source {
                StdStream::Stdout => stdout_lines.push(line.content),
                StdStream::Stderr => stderr_lines.push(line.content),
            }
        }

        assert_eq!(stdout_lines, vec!["one", "three"]);
        assert_eq!(stderr_lines, vec!["two"]);
    }

    #[tokio::test]
    async fn test_stream_nonzero_exit_surfaces_terminal_error() {
        let executor = ProcessExecutor::new();
        let mut stream = executor
            .stream(&sh("echo partial; exit 3"), &CancellationToken::new())
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, "partial");

        let terminal = stream.next().await.unwrap().unwrap_err();
        match terminal {
            ExecError::ExitCode { code, .. } => assert_eq!(code, 3),
            other => panic!("expected ExitCode, got {other:?}"),
        }
        assert!(stream.next().await.is_none(), "stream must be finite");
    }

    #[tokio::test]
    async fn test_stream_cancellation_terminates_child() {
        let executor = ProcessExecutor::new();
        let token = CancellationToken::new();
        let mut stream = executor
            .stream(&sh("echo started; sleep 30; echo never"), &token)
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.content, "started");

        token.cancel();
        let started = Instant::now();
        let mut saw_cancelled = false;
        while let Some(item) = stream.next().await {
            if matches!(item, Err(ExecError::Cancelled)) {
                saw_cancelled = true;
            }
        }
        assert!(saw_cancelled, "consumer must observe Cancelled, not truncated success");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dropping_stream_terminates_silent_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let script = format!("sleep 1; touch {}", marker.display());

        let executor = ProcessExecutor::new();
        let stream = executor.stream(&sh(&script), &CancellationToken::new()).unwrap();
        drop(stream);

        // Long enough for an orphaned child to have reached the touch
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(
            !marker.exists(),
            "child must not outlive its dropped stream"
        );
    }

    #[tokio::test]
    async fn test_stream_completion_equals_process_exit() {
        let executor = ProcessExecutor::new();
        let mut stream = executor
            .stream(&sh("echo a; echo b"), &CancellationToken::new())
            .unwrap();

        let mut count = 0;
        while let Some(item) = stream.next().await {
            item.unwrap();
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
