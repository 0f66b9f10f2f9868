// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process spawning, output streaming, and exit tracking.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::{Mutex, mpsc, oneshot, watch};

use super::ProcessSpec;
use crate::error::ProcessError;

/// Capacity of the per-process output line channel.
const LINE_BUFFER: usize = 256;

/// Silence after which an unterminated output fragment is emitted as a line.
///
/// Interactive tools print prompts without a trailing newline and then block
/// on input, so waiting for the newline would never deliver the prompt.
const PARTIAL_FLUSH: Duration = Duration::from_millis(100);

/// Size of the read buffer used by output readers.
const READ_CHUNK: usize = 4096;

/// Which standard stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// One line of process output, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// The stream the line was read from.
    pub stream: OutputStream,
    /// The line text.
    pub text: String,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    /// Exit reported when the status could not be collected.
    pub const UNKNOWN: Self = Self { code: None };

    fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }

    /// Returns the exit code, or `None` if the process was killed by a signal.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Returns true if the process exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Captured result of a process run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if killed by a signal.
    pub code: Option<i32>,
    /// Everything written to standard output.
    pub stdout: String,
    /// Everything written to standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Returns true if the process exited with code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Writable handle to a running process's standard input.
///
/// Cheap to clone; all clones write to the same pipe.
#[derive(Debug, Clone)]
pub struct ProcessInput {
    stdin: Arc<Mutex<Option<ChildStdin>>>,
}

impl ProcessInput {
    fn new(stdin: ChildStdin) -> Self {
        Self {
            stdin: Arc::new(Mutex::new(Some(stdin))),
        }
    }

    /// Writes `line` followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::InputClosed` if the input was closed, or
    /// `ProcessError::Input` if the write fails (typically because the
    /// process has exited). A failed write closes the input.
    pub async fn write_line(&self, line: &str) -> Result<(), ProcessError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(ProcessError::InputClosed)?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let result = match stdin.write_all(buf.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            guard.take();
            return Err(ProcessError::Input(e));
        }
        Ok(())
    }

    /// Closes the input, signalling end-of-file to the process.
    pub async fn close(&self) {
        self.stdin.lock().await.take();
    }
}

/// Observer of a running process's exit.
///
/// Cheap to clone; every clone sees the same exit.
#[derive(Debug, Clone)]
pub struct ExitWatch(watch::Receiver<Option<ProcessExit>>);

impl ExitWatch {
    /// Returns the exit if the process has ended.
    #[must_use]
    pub fn exit(&self) -> Option<ProcessExit> {
        *self.0.borrow()
    }

    /// Returns true if the process has ended.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit().is_some()
    }

    /// Waits until the process ends.
    pub async fn wait(&mut self) -> ProcessExit {
        let waited = self
            .0
            .wait_for(Option::is_some)
            .await
            .map(|exit| *exit)
            .ok()
            .flatten();
        waited.or_else(|| self.exit()).unwrap_or(ProcessExit::UNKNOWN)
    }
}

/// A process started with [`ProcessRunner::spawn`].
///
/// The process is killed when this handle is dropped.
#[derive(Debug)]
pub struct RunningProcess {
    pid: Option<u32>,
    input: ProcessInput,
    lines: Option<mpsc::Receiver<OutputLine>>,
    exit: ExitWatch,
    kill: Option<oneshot::Sender<()>>,
}

impl RunningProcess {
    /// Returns the OS process id, if still known.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns a handle to the process input.
    #[must_use]
    pub fn input(&self) -> ProcessInput {
        self.input.clone()
    }

    /// Takes the stdout/stderr line receiver.
    ///
    /// Returns `None` if it was already taken. Dropping the receiver stops the
    /// output readers.
    pub fn take_lines(&mut self) -> Option<mpsc::Receiver<OutputLine>> {
        self.lines.take()
    }

    /// Returns an observer of the process exit.
    #[must_use]
    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }

    /// Returns true if the process has ended.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.has_exited()
    }

    /// Waits until the process ends.
    pub async fn wait(&self) -> ProcessExit {
        self.exit.clone().wait().await
    }

    /// Requests the process to be killed. Does not wait for it to exit.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Spawns external processes.
///
/// Stateless; all methods are associated functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Runs a process to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the executable cannot be started.
    pub async fn output(spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        let mut command = spec.command();
        command.stdin(Stdio::null()).kill_on_drop(true);

        tracing::debug!(command = %spec, "running process");
        let output = command.output().await.map_err(|source| ProcessError::Spawn {
            program: spec.program().display().to_string(),
            source,
        })?;

        let output = ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %spec, code = ?output.code, "process finished");
        Ok(output)
    }

    /// Starts a long-running process with piped input and streamed output.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the executable cannot be started.
    pub fn spawn(spec: &ProcessSpec) -> Result<RunningProcess, ProcessError> {
        let mut command = spec.command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program().display().to_string(),
            source,
        })?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or(ProcessError::MissingStream("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingStream("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingStream("stderr"))?;

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        tokio::spawn(forward_output(stdout, OutputStream::Stdout, line_tx.clone()));
        tokio::spawn(forward_output(stderr, OutputStream::Stderr, line_tx));

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let shown = spec.to_string();

        tokio::spawn(async move {
            enum Wake {
                Exited(std::io::Result<ExitStatus>),
                Kill,
            }

            let wake = tokio::select! {
                status = child.wait() => Wake::Exited(status),
                _ = kill_rx => Wake::Kill,
            };
            let status = match wake {
                Wake::Exited(status) => status,
                Wake::Kill => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(command = %shown, error = %e, "kill failed");
                    }
                    child.wait().await
                }
            };

            let exit = match status {
                Ok(status) => ProcessExit::from_status(status),
                Err(e) => {
                    tracing::warn!(command = %shown, error = %e, "failed to collect exit status");
                    ProcessExit::UNKNOWN
                }
            };
            tracing::debug!(command = %shown, code = ?exit.code(), "process exited");
            let _ = exit_tx.send(Some(exit));
        });

        tracing::debug!(command = %spec, pid = ?pid, "spawned process");

        Ok(RunningProcess {
            pid,
            input: ProcessInput::new(stdin),
            lines: Some(line_rx),
            exit: ExitWatch(exit_rx),
            kill: Some(kill_tx),
        })
    }

    /// Starts a process and does not wait for it.
    ///
    /// Output is discarded; the exit code is logged at debug level.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the executable cannot be started.
    pub fn detach(spec: &ProcessSpec) -> Result<(), ProcessError> {
        let mut command = spec.command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program().display().to_string(),
            source,
        })?;
        let shown = spec.to_string();

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    tracing::debug!(command = %shown, code = ?status.code(), "detached process exited");
                }
                Err(e) => {
                    tracing::warn!(command = %shown, error = %e, "detached process wait failed");
                }
            }
        });
        Ok(())
    }
}

/// Reads `reader` and forwards complete lines, flushing an unterminated
/// fragment after [`PARTIAL_FLUSH`] of silence.
async fn forward_output<R>(mut reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = if pending.is_empty() {
            reader.read(&mut buf).await
        } else {
            match tokio::time::timeout(PARTIAL_FLUSH, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    if !emit(&tx, stream, &pending).await {
                        return;
                    }
                    pending.clear();
                    continue;
                }
            }
        };

        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    if !emit(&tx, stream, &line[..pos]).await {
                        return;
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        emit(&tx, stream, &pending).await;
    }
}

/// Sends one line; returns false once the receiver is gone.
async fn emit(tx: &mpsc::Sender<OutputLine>, stream: OutputStream, bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let line = OutputLine {
        stream,
        text: text.trim_end_matches('\r').to_string(),
    };
    tx.send(line).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn output_captures_streams_and_exit_code() {
        let output = ProcessRunner::output(&sh("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[tokio::test]
    async fn output_reports_missing_executable() {
        let result = ProcessRunner::output(&ProcessSpec::new("/nonexistent/atv-test-binary")).await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn spawned_process_echoes_input() {
        let mut process = ProcessRunner::spawn(&ProcessSpec::new("cat")).unwrap();
        let mut lines = process.take_lines().unwrap();

        process.input().write_line("select").await.unwrap();
        let line = lines.recv().await.unwrap();
        assert_eq!(line.stream, OutputStream::Stdout);
        assert_eq!(line.text, "select");

        process.input().close().await;
        let exit = process.wait().await;
        assert!(exit.success());
    }

    #[tokio::test]
    async fn unterminated_prompt_is_flushed() {
        let mut process =
            ProcessRunner::spawn(&sh("printf 'Enter PIN on screen: '; read pin; echo \"got $pin\""))
                .unwrap();
        let mut lines = process.take_lines().unwrap();

        let prompt = lines.recv().await.unwrap();
        assert_eq!(prompt.text, "Enter PIN on screen: ");

        process.input().write_line("1234").await.unwrap();
        let reply = lines.recv().await.unwrap();
        assert_eq!(reply.text, "got 1234");
        assert_eq!(process.wait().await.code(), Some(0));
    }

    #[tokio::test]
    async fn stderr_lines_are_tagged() {
        let mut process = ProcessRunner::spawn(&sh("echo oops >&2")).unwrap();
        let mut lines = process.take_lines().unwrap();

        let line = lines.recv().await.unwrap();
        assert_eq!(line.stream, OutputStream::Stderr);
        assert_eq!(line.text, "oops");
    }

    #[tokio::test]
    async fn dropping_handle_kills_process() {
        let process = ProcessRunner::spawn(&ProcessSpec::new("sleep").arg("30")).unwrap();
        let mut exit = process.exit_watch();
        assert!(!exit.has_exited());

        drop(process);
        let exit = tokio::time::timeout(Duration::from_secs(5), exit.wait())
            .await
            .expect("process should be killed");
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn every_exit_watch_sees_the_same_code() {
        let process = ProcessRunner::spawn(&sh("exit 4")).unwrap();
        let mut early = process.exit_watch();
        let mut late = early.clone();

        assert_eq!(early.wait().await.code(), Some(4));
        assert_eq!(late.wait().await.code(), Some(4));
        assert_eq!(process.exit_watch().exit().and_then(|e| e.code()), Some(4));
        drop(process);
        assert_eq!(late.wait().await.code(), Some(4));
    }

    #[tokio::test]
    async fn write_after_exit_fails() {
        let process = ProcessRunner::spawn(&sh("exit 0")).unwrap();
        process.wait().await;

        // The first write may still land in the pipe buffer; keep writing
        // until the broken pipe surfaces.
        let mut failed = false;
        for _ in 0..50 {
            if process.input().write_line("up").await.is_err() {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn detached_process_is_started() {
        ProcessRunner::detach(&ProcessSpec::new("true")).unwrap();
    }
}
