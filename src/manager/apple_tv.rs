// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle of one bridged Apple TV.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::channel::{CommandSender, ControlChannel, authenticated};
use crate::connectivity::{Accessory, ConnectivityMonitor, DeviceControl, DeviceSnapshot, PowerOnWindow};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ChannelError, DeviceError, Error};
use crate::event::{BridgeEvent, EventBus};
use crate::pairing::Pairer;
use crate::process::{ProcessRunner, ProcessSpec};
use crate::types::{DeviceId, DeviceIdentity, MediaType, PlaybackState, RemoteCommand};

/// Pause before a closed control channel is reopened.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// One-shot query printing the current playback state and media type.
const STATE_QUERY: &str = "playing";

/// A paired Apple TV with a supervised control channel.
///
/// The device owns a background task that keeps a [`ControlChannel`] open
/// for its whole lifetime, opening a new one [`RECONNECT_DELAY`] after the
/// previous one closed. Dropping the device stops the task and kills the
/// control process.
#[derive(Debug)]
pub struct AppleTvDevice {
    identity: DeviceIdentity,
    remote: ProcessSpec,
    credentials: Credentials,
    sender: Arc<RwLock<Option<CommandSender>>>,
    window: Arc<PowerOnWindow>,
    events: EventBus,
    supervisor: JoinHandle<()>,
}

impl AppleTvDevice {
    /// Loads or obtains credentials and starts the control channel.
    ///
    /// Without stored credentials the device is paired through `pairer`
    /// first and the result is persisted before any control process runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Credentials` if the store cannot be read or written,
    /// or `Error::Pairing` if pairing cannot be carried out.
    pub async fn start(
        identity: DeviceIdentity,
        store: &CredentialStore,
        pairer: &dyn Pairer,
        remote: ProcessSpec,
        events: EventBus,
    ) -> Result<Self, Error> {
        let credentials = ensure_credentials(&identity, store, pairer, &events).await?;

        let sender = Arc::new(RwLock::new(None));
        let supervisor = tokio::spawn(supervise(
            identity.id.clone(),
            remote.clone(),
            credentials.clone(),
            Arc::clone(&sender),
            events.clone(),
        ));

        Ok(Self {
            identity,
            remote,
            credentials,
            sender,
            window: Arc::new(PowerOnWindow::new()),
            events,
            supervisor,
        })
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.identity.id
    }

    /// Returns the device identity.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns true while a control channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Returns the power-on window shared by the power paths and the
    /// event handlers of this device.
    #[must_use]
    pub fn power_window(&self) -> &Arc<PowerOnWindow> {
        &self.window
    }

    /// Sends a remote command over the current control channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::Channel` if no channel is open or the write fails.
    pub async fn send(&self, command: RemoteCommand) -> Result<(), Error> {
        let sender = self.sender.read().clone().ok_or(ChannelError::NotOpen)?;
        sender.send(command).await?;
        Ok(())
    }

    /// Launches an app by bundle identifier without waiting for the result.
    ///
    /// An empty identifier is logged and ignored.
    pub fn launch_app(&self, bundle_id: &str) {
        let bundle_id = bundle_id.trim();
        if bundle_id.is_empty() {
            tracing::warn!(device = %self.identity.id, "ignoring launch of an empty app identifier");
            return;
        }

        let spec = authenticated(&self.remote, &self.identity.id, &self.credentials)
            .arg(format!("launch_app={bundle_id}"));
        if let Err(e) = ProcessRunner::detach(&spec) {
            tracing::warn!(device = %self.identity.id, error = %e, "could not launch app");
        }
    }

    /// Creates a connectivity monitor that drives `accessory` and shares this
    /// device's power-on window and event bus.
    #[must_use]
    pub fn monitor(self: &Arc<Self>, accessory: Arc<dyn Accessory>) -> ConnectivityMonitor {
        let control: Arc<dyn DeviceControl> = Arc::clone(self) as Arc<dyn DeviceControl>;
        ConnectivityMonitor::new(self.identity.id.clone(), accessory, control)
            .with_window(Arc::clone(&self.window))
            .with_event_bus(self.events.clone())
    }
}

impl Drop for AppleTvDevice {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

#[async_trait]
impl DeviceControl for AppleTvDevice {
    async fn turn_on(&self) -> Result<(), DeviceError> {
        self.send(RemoteCommand::TurnOn)
            .await
            .map_err(|e| DeviceError::CommandFailed(e.to_string()))
    }

    async fn turn_off(&self) -> Result<(), DeviceError> {
        self.send(RemoteCommand::TurnOff)
            .await
            .map_err(|e| DeviceError::CommandFailed(e.to_string()))
    }

    async fn state(&self) -> Result<DeviceSnapshot, DeviceError> {
        let spec = authenticated(&self.remote, &self.identity.id, &self.credentials).arg(STATE_QUERY);
        let output = ProcessRunner::output(&spec)
            .await
            .map_err(|e| DeviceError::CommandFailed(e.to_string()))?;
        if !output.success() {
            return Err(DeviceError::CommandFailed(format!(
                "state query exited with {:?}",
                output.code
            )));
        }
        Ok(parse_state(&output.stdout))
    }
}

/// Reads `Device state:` and `Media type:` lines of a state query.
fn parse_state(stdout: &str) -> DeviceSnapshot {
    let mut snapshot = DeviceSnapshot::default();
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "Device state" => snapshot.device_state = value.trim().parse::<PlaybackState>().ok(),
            "Media type" => snapshot.media_type = value.trim().parse::<MediaType>().ok(),
            _ => {}
        }
    }
    snapshot
}

async fn ensure_credentials(
    identity: &DeviceIdentity,
    store: &CredentialStore,
    pairer: &dyn Pairer,
    events: &EventBus,
) -> Result<Credentials, Error> {
    let device = &identity.id;
    if let Some(credentials) = store.load(device).await? {
        tracing::debug!(%device, "using stored credentials");
        return Ok(credentials);
    }

    tracing::info!(%device, name = %identity.name, "no stored credentials, starting pairing");
    events.publish(BridgeEvent::PairingStarted {
        device: device.clone(),
    });
    let credentials = pairer.pair(&identity.host, &identity.name).await?;
    store.save(device, &credentials).await?;

    events.publish(BridgeEvent::Paired {
        device: device.clone(),
    });
    Ok(credentials)
}

/// Keeps a control channel open, reopening it after every close.
async fn supervise(
    device: DeviceId,
    remote: ProcessSpec,
    credentials: Credentials,
    sender: Arc<RwLock<Option<CommandSender>>>,
    events: EventBus,
) {
    loop {
        match ControlChannel::open(&remote, &device, &credentials) {
            Ok((channel, closed)) => {
                *sender.write() = Some(channel.sender());
                events.publish(BridgeEvent::ChannelOpened {
                    device: device.clone(),
                });

                let exit = closed.wait().await;
                *sender.write() = None;
                let heartbeats = channel.heartbeats_sent();
                channel.close();

                tracing::warn!(
                    %device,
                    code = ?exit.code(),
                    heartbeats,
                    "lost connection, trying to reconnect"
                );
                events.publish(BridgeEvent::ConnectionLost {
                    device: device.clone(),
                    exit_code: exit.code(),
                });
            }
            Err(e) => {
                tracing::warn!(%device, error = %e, "could not open control channel, trying to reconnect");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_query_output_is_parsed() {
        let stdout = "Media type: Video\nDevice state: Playing\nTitle: Something: with colon\n";
        assert_eq!(
            parse_state(stdout),
            DeviceSnapshot {
                device_state: Some(PlaybackState::Playing),
                media_type: Some(MediaType::Video),
            }
        );
    }

    #[test]
    fn unknown_values_stay_empty() {
        let snapshot = parse_state("Device state: Warping\nnonsense\n");
        assert_eq!(snapshot, DeviceSnapshot::default());
    }
}
