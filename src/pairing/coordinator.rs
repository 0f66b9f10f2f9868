// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The interactive pairing loop.

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use super::output::{BACKOFF_SAFETY_MARGIN, PairingOutput};
use super::pin_server::PinServer;
use super::session::{AttemptOutcome, PairingSession};
use crate::credentials::Credentials;
use crate::error::{PairingError, ProcessError};
use crate::process::{ProcessRunner, ProcessSpec};

/// Base of the PIN endpoint port; the device's last IPv4 octet is added.
pub const CALLBACK_PORT_BASE: u16 = 42000;

/// How often an attempt checks for completion.
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// After this long a still-running pairing process gets a bare newline,
/// which makes it give up and exit.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(32);

/// Granularity of the logged backoff countdown.
pub const BACKOFF_TICK: Duration = Duration::from_secs(1);

/// How often the PIN entry URL is repeated while a prompt is outstanding.
pub const PIN_REMINDER_INTERVAL: Duration = Duration::from_secs(10);

/// Pause after an attempt that could not start the tool or bind the PIN port.
pub const ATTEMPT_FAILURE_DELAY: Duration = BACKOFF_SAFETY_MARGIN;

/// Returns the PIN endpoint port for a device at `host`.
///
/// # Errors
///
/// Returns `PairingError::InvalidHost` if `host` is not a dotted IPv4 address.
///
/// # Examples
///
/// ```
/// use atv_bridge::pairing::callback_port;
///
/// assert_eq!(callback_port("192.168.1.23").unwrap(), 42023);
/// ```
pub fn callback_port(host: &str) -> Result<u16, PairingError> {
    let addr: Ipv4Addr = host
        .trim()
        .parse()
        .map_err(|_| PairingError::InvalidHost(host.to_string()))?;
    let [_, _, _, last] = addr.octets();
    Ok(CALLBACK_PORT_BASE + u16::from(last))
}

/// Sleeps for `wait`, logging the remaining time once per [`BACKOFF_TICK`].
pub async fn backoff_countdown(wait: Duration) {
    tracing::info!(seconds = wait.as_secs(), "device requested backoff before next pairing attempt");

    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tracing::debug!(remaining = remaining.as_secs(), "waiting before next pairing attempt");
        tokio::time::sleep(remaining.min(BACKOFF_TICK)).await;
    }
}

/// Drives first-time pairing against a device.
///
/// Each attempt spawns the pairing tool with companion-protocol arguments
/// appended to a base command, serves the PIN entry page on
/// `0.0.0.0:<42000 + last octet>`, and waits until a marker has been printed
/// and the tool has exited. The loop only ends on success.
///
/// # Examples
///
/// ```no_run
/// use atv_bridge::pairing::PairingCoordinator;
/// use atv_bridge::process::ProcessSpec;
///
/// # async fn example() -> Result<(), atv_bridge::error::PairingError> {
/// let coordinator = PairingCoordinator::new(ProcessSpec::new("/srv/venv/bin/atvremote"));
/// let credentials = coordinator.pair("192.168.1.23", "Living Room").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PairingCoordinator {
    base: ProcessSpec,
}

impl PairingCoordinator {
    /// Creates a coordinator that runs `base` plus the pairing arguments.
    #[must_use]
    pub fn new(base: ProcessSpec) -> Self {
        Self { base }
    }

    /// Returns the full pairing command for `host`.
    #[must_use]
    pub fn pairing_command(&self, host: &str) -> ProcessSpec {
        self.base
            .clone()
            .args(["--scan-hosts", host, "--protocol", "companion", "pair"])
    }

    /// Pairs with the device at `host`, retrying until it succeeds.
    ///
    /// # Errors
    ///
    /// Returns `PairingError::InvalidHost` if no PIN port can be derived
    /// from `host`. A tool that cannot be spawned or a PIN port that is
    /// already taken only fails the current attempt.
    pub async fn pair(&self, host: &str, display_name: &str) -> Result<Credentials, PairingError> {
        let port = callback_port(host)?;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut session = PairingSession::new(host, port);
            tracing::info!(
                device = %display_name,
                %host,
                attempt,
                session = %session.id(),
                "starting pairing attempt"
            );

            if let Err(e) = self.run_attempt(&mut session, display_name).await {
                tracing::warn!(
                    device = %display_name,
                    attempt,
                    error = %e,
                    "could not run pairing attempt, retrying"
                );
                tokio::time::sleep(ATTEMPT_FAILURE_DELAY).await;
                continue;
            }

            match session.into_outcome() {
                AttemptOutcome::Paired(credentials) => {
                    tracing::info!(device = %display_name, attempt, "pairing succeeded");
                    return Ok(credentials);
                }
                AttemptOutcome::BackOff(wait) => backoff_countdown(wait).await,
                AttemptOutcome::Retry => {
                    tracing::info!(device = %display_name, attempt, "pairing attempt failed, retrying");
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        session: &mut PairingSession,
        display_name: &str,
    ) -> Result<(), PairingError> {
        let mut process = ProcessRunner::spawn(&self.pairing_command(session.host()))?;
        let mut lines = process
            .take_lines()
            .ok_or(ProcessError::MissingStream("output"))?;
        let exit = process.exit_watch();

        let server = PinServer::start(session.port(), process.input(), display_name).await?;

        let watchdog = {
            let input = process.input();
            let exit = process.exit_watch();
            tokio::spawn(async move {
                tokio::time::sleep(WATCHDOG_TIMEOUT).await;
                if !exit.has_exited() {
                    tracing::debug!("pairing process still running, sending newline");
                    let _ = input.write_line("").await;
                }
            })
        };

        let mut output_open = true;
        let mut last_reminder: Option<Instant> = None;

        loop {
            // Exit is checked before draining so output printed just before
            // exiting is still classified in this iteration.
            if exit.has_exited() {
                session.mark_exited();
            }

            while output_open {
                match lines.try_recv() {
                    Ok(line) => {
                        let output = session.observe(&line.text);
                        log_output(&output, display_name, session.port());
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => output_open = false,
                }
            }

            if session.is_complete() {
                break;
            }
            if session.process_exited() && !output_open {
                tracing::debug!(device = %display_name, "pairing process exited without a result");
                break;
            }

            if session.pin_prompt_seen() && !session.succeeded() && !session.process_exited() {
                let due = last_reminder.is_none_or(|at| at.elapsed() >= PIN_REMINDER_INTERVAL);
                if due {
                    warn_pin_needed(display_name, session.port());
                    last_reminder = Some(Instant::now());
                }
            }

            tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
        }

        watchdog.abort();
        server.shutdown().await;
        Ok(())
    }
}

fn log_output(output: &PairingOutput, display_name: &str, port: u16) {
    match output {
        PairingOutput::PinPrompt => warn_pin_needed(display_name, port),
        PairingOutput::BackOff(wait) => {
            tracing::info!(device = %display_name, seconds = wait.as_secs(), "device is rate limiting pairing");
        }
        PairingOutput::Error => {
            tracing::info!(device = %display_name, "pairing process reported an error");
        }
        PairingOutput::Success(_) => {
            tracing::debug!(device = %display_name, "pairing process printed credentials");
        }
        PairingOutput::Other => {}
    }
}

fn warn_pin_needed(display_name: &str, port: u16) {
    tracing::warn!(
        device = %display_name,
        port,
        "enter the PIN shown on the TV at http://<this host>:{port}/ to pair {display_name}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_from_last_octet() {
        assert_eq!(callback_port("10.0.0.1").unwrap(), 42001);
        assert_eq!(callback_port("192.168.1.255").unwrap(), 42255);
    }

    #[test]
    fn non_ipv4_host_is_rejected() {
        assert!(matches!(
            callback_port("appletv.local"),
            Err(PairingError::InvalidHost(_))
        ));
        assert!(callback_port("10.0.0").is_err());
    }

    #[test]
    fn pairing_command_appends_companion_arguments() {
        let coordinator = PairingCoordinator::new(ProcessSpec::new("atvremote"));
        let spec = coordinator.pairing_command("10.0.0.8");
        assert_eq!(
            spec.to_string(),
            "atvremote --scan-hosts 10.0.0.8 --protocol companion pair"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_requested_time_plus_margin() {
        let wait = match super::super::output::classify("BackOff=12s") {
            PairingOutput::BackOff(wait) => wait,
            other => panic!("unexpected classification {other:?}"),
        };

        let start = Instant::now();
        backoff_countdown(wait).await;
        assert!(start.elapsed() >= Duration::from_secs(17));
        assert!(start.elapsed() < Duration::from_secs(18));
    }
}
