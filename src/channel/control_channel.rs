// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control process lifecycle, heartbeat, and close notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::credentials::Credentials;
use crate::error::{ChannelError, ProcessError};
use crate::process::{
    ExitWatch, OutputLine, ProcessExit, ProcessInput, ProcessRunner, ProcessSpec, RunningProcess,
};
use crate::types::{DeviceId, RemoteCommand};

/// Interval between keep-alive commands.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Harmless query written as the heartbeat.
const HEARTBEAT_COMMAND: RemoteCommand = RemoteCommand::AppList;

/// Cloneable handle for writing commands to a control channel.
#[derive(Debug, Clone)]
pub struct CommandSender {
    device: DeviceId,
    input: ProcessInput,
}

impl CommandSender {
    /// Writes `command` to the control process.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Process` if the process input is gone, which
    /// means the channel is closing.
    pub async fn send(&self, command: RemoteCommand) -> Result<(), ChannelError> {
        tracing::debug!(device = %self.device, %command, "sending remote command");
        self.input.write_line(command.as_str()).await?;
        Ok(())
    }
}

/// Resolves once, when the control process of a channel has exited.
///
/// Consuming `self` in [`wait`](Self::wait) and [`on_close`](Self::on_close)
/// makes the notification single-subscriber and single-shot.
#[derive(Debug)]
pub struct ChannelClosed {
    rx: oneshot::Receiver<ProcessExit>,
}

impl ChannelClosed {
    /// Waits until the control process has exited.
    pub async fn wait(self) -> ProcessExit {
        self.rx.await.unwrap_or(ProcessExit::UNKNOWN)
    }

    /// Runs `callback` once the control process has exited.
    pub fn on_close<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(ProcessExit) + Send + 'static,
    {
        tokio::spawn(async move {
            callback(self.wait().await);
        })
    }
}

/// An open control channel to one device.
///
/// Dropping the channel kills the control process; the close notification
/// still fires.
#[derive(Debug)]
pub struct ControlChannel {
    device: DeviceId,
    process: RunningProcess,
    heartbeats: Arc<AtomicU64>,
}

impl ControlChannel {
    /// Starts the control process for `device` in interactive command mode.
    ///
    /// `base` is the remote-control executable (plus any leading arguments);
    /// the device id, both credential arguments and the interactive mode
    /// argument are appended.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Process` if the process cannot be spawned.
    pub fn open(
        base: &ProcessSpec,
        device: &DeviceId,
        credentials: &Credentials,
    ) -> Result<(Self, ChannelClosed), ChannelError> {
        Self::open_with_heartbeat(base, device, credentials, HEARTBEAT_INTERVAL)
    }

    pub(crate) fn open_with_heartbeat(
        base: &ProcessSpec,
        device: &DeviceId,
        credentials: &Credentials,
        heartbeat: Duration,
    ) -> Result<(Self, ChannelClosed), ChannelError> {
        let spec = control_command(base, device, credentials);
        let mut process = ProcessRunner::spawn(&spec)?;
        let lines = process
            .take_lines()
            .ok_or(ProcessError::MissingStream("output"))?;

        let heartbeats = Arc::new(AtomicU64::new(0));
        let (closed_tx, closed_rx) = oneshot::channel();

        tokio::spawn(supervise(
            device.clone(),
            process.input(),
            process.exit_watch(),
            lines,
            heartbeat,
            Arc::clone(&heartbeats),
            closed_tx,
        ));

        tracing::info!(%device, pid = ?process.pid(), "control channel opened");
        let channel = Self {
            device: device.clone(),
            process,
            heartbeats,
        };
        Ok((channel, ChannelClosed { rx: closed_rx }))
    }

    /// Returns the device this channel controls.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Returns a cloneable command handle.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            device: self.device.clone(),
            input: self.process.input(),
        }
    }

    /// Writes `command` to the control process.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Process` if the process input is gone.
    pub async fn send(&self, command: RemoteCommand) -> Result<(), ChannelError> {
        self.sender().send(command).await
    }

    /// Returns true if the control process has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.process.has_exited()
    }

    /// Returns how many heartbeats were written successfully.
    #[must_use]
    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Kills the control process.
    ///
    /// The close notification still fires, once, if it has not already.
    pub fn close(mut self) {
        self.process.kill();
    }
}

/// `base` with the device id and both credential arguments appended.
pub(crate) fn authenticated(base: &ProcessSpec, device: &DeviceId, credentials: &Credentials) -> ProcessSpec {
    base.clone()
        .args(["--id", device.as_str()])
        .arg("--companion-credentials")
        .secret_arg(credentials.expose())
        .arg("--airplay-credentials")
        .secret_arg(credentials.expose())
}

fn control_command(base: &ProcessSpec, device: &DeviceId, credentials: &Credentials) -> ProcessSpec {
    authenticated(base, device, credentials).arg("cli")
}

/// Heartbeat, output draining, and exit detection for one channel.
///
/// Ends when the process exits; the output listener and the heartbeat stop
/// with it, and the close notification is sent exactly once.
async fn supervise(
    device: DeviceId,
    input: ProcessInput,
    mut exit: ExitWatch,
    mut lines: mpsc::Receiver<OutputLine>,
    heartbeat: Duration,
    heartbeats: Arc<AtomicU64>,
    closed: oneshot::Sender<ProcessExit>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut output_open = true;

    let status = loop {
        tokio::select! {
            biased;
            status = exit.wait() => break status,
            line = lines.recv(), if output_open => match line {
                Some(line) => tracing::trace!(%device, stream = ?line.stream, text = %line.text, "control output"),
                None => output_open = false,
            },
            _ = ticker.tick() => {
                match input.write_line(HEARTBEAT_COMMAND.as_str()).await {
                    Ok(()) => {
                        heartbeats.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => tracing::debug!(%device, error = %e, "heartbeat write failed"),
                }
            }
        }
    };

    drop(lines);
    tracing::debug!(%device, code = ?status.code(), "control process exited");
    let _ = closed.send(status);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap()
    }

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script).arg("sh")
    }

    #[test]
    fn control_command_redacts_credentials() {
        let spec = control_command(
            &ProcessSpec::new("atvremote"),
            &device(),
            &Credentials::new("secret"),
        );
        assert_eq!(
            spec.to_string(),
            "atvremote --id AA:BB:CC:DD:EE:FF --companion-credentials <redacted> \
             --airplay-credentials <redacted> cli"
        );
        assert_eq!(spec.arg_values().iter().filter(|a| *a == "secret").count(), 2);
    }

    #[tokio::test]
    async fn close_fires_once_and_heartbeat_stops() {
        let (channel, closed) = ControlChannel::open_with_heartbeat(
            &sh("read first; read second; exit 3"),
            &device(),
            &Credentials::new("creds"),
            Duration::from_millis(50),
        )
        .unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(10), closed.wait())
            .await
            .unwrap();
        assert_eq!(exit.code(), Some(3));
        assert!(channel.is_closed());

        let after_close = channel.heartbeats_sent();
        assert!(after_close >= 2);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(channel.heartbeats_sent(), after_close);
    }

    #[tokio::test]
    async fn on_close_callback_runs_with_exit() {
        let (_channel, closed) = ControlChannel::open(
            &sh("exit 7"),
            &device(),
            &Credentials::new("creds"),
        )
        .unwrap();

        let (tx, rx) = oneshot::channel();
        closed.on_close(move |exit| {
            let _ = tx.send(exit.code());
        });
        let code = tokio::time::timeout(Duration::from_secs(10), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, Some(7));
    }

    #[tokio::test]
    async fn commands_are_written_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("commands.txt");
        let base = ProcessSpec::new("sh")
            .arg("-c")
            .arg("read a; read b; printf '%s\\n%s\\n' \"$a\" \"$b\" > \"$0\"")
            .arg(log.display().to_string());

        let (channel, closed) = ControlChannel::open(&base, &device(), &Credentials::new("c")).unwrap();
        channel.send(RemoteCommand::Select).await.unwrap();
        channel.sender().send(RemoteCommand::PlayPause).await.unwrap();

        tokio::time::timeout(Duration::from_secs(10), closed.wait())
            .await
            .unwrap();
        let written = std::fs::read_to_string(&log).unwrap();
        assert_eq!(written, "select\nplay_pause\n");
    }

    #[tokio::test]
    async fn dropping_channel_kills_process() {
        let (channel, closed) = ControlChannel::open(
            &ProcessSpec::new("sleep").arg("30"),
            &device(),
            &Credentials::new("c"),
        )
        .unwrap();
        drop(channel);

        let exit = tokio::time::timeout(Duration::from_secs(10), closed.wait())
            .await
            .unwrap();
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn explicit_close_kills_process_and_notifies() {
        let (channel, closed) = ControlChannel::open(
            &ProcessSpec::new("sleep").arg("30"),
            &device(),
            &Credentials::new("c"),
        )
        .unwrap();
        assert!(!channel.is_closed());
        assert_eq!(channel.heartbeats_sent(), 0);
        channel.close();

        let exit = tokio::time::timeout(Duration::from_secs(10), closed.wait())
            .await
            .unwrap();
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn missing_executable_fails_to_open() {
        let result = ControlChannel::open(
            &ProcessSpec::new("/nonexistent/atvremote"),
            &device(),
            &Credentials::new("c"),
        );
        assert!(matches!(result, Err(ChannelError::Process(_))));
    }
}
