// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-device coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use super::apple_tv::AppleTvDevice;
use super::bridge_config::BridgeConfig;
use crate::credentials::CredentialStore;
use crate::environment::{EnvironmentChecker, EnvironmentReport};
use crate::error::Error;
use crate::event::{BridgeEvent, EventBus};
use crate::pairing::{Pairer, PairingCoordinator};
use crate::process::ProcessSpec;
use crate::types::{DeviceId, DeviceIdentity, RemoteCommand};

/// Owns the bridged devices and the shared collaborators they are built
/// from.
///
/// # Examples
///
/// ```no_run
/// use atv_bridge::manager::{Bridge, BridgeConfig};
/// use atv_bridge::types::{DeviceId, DeviceIdentity, RemoteCommand};
///
/// # async fn example() -> atv_bridge::Result<()> {
/// let bridge = Bridge::new(BridgeConfig::new("/var/lib/homebridge"));
/// bridge.prepare_environment().await?;
///
/// let id = DeviceId::new("AA:BB:CC:DD:EE:FF")?;
/// bridge
///     .add_device(DeviceIdentity::new(id.clone(), "192.168.1.23", "Living Room"))
///     .await?;
/// bridge.send(&id, RemoteCommand::Home).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bridge {
    config: BridgeConfig,
    store: CredentialStore,
    pairer: Arc<dyn Pairer>,
    remote: ProcessSpec,
    devices: Arc<RwLock<HashMap<DeviceId, Arc<AppleTvDevice>>>>,
    events: EventBus,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge that pairs and controls devices with the configured
    /// remote-control tool.
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let remote = config.remote_spec();
        Self {
            store: config.credential_store(),
            pairer: Arc::new(PairingCoordinator::new(remote.clone())),
            remote,
            config,
            devices: Arc::new(RwLock::new(HashMap::new())),
            events: EventBus::new(),
        }
    }

    /// Replaces the pairing implementation.
    #[must_use]
    pub fn with_pairer(mut self, pairer: impl Pairer + 'static) -> Self {
        self.pairer = Arc::new(pairer);
        self
    }

    /// Replaces the base command of control processes.
    #[must_use]
    pub fn with_remote_spec(mut self, remote: ProcessSpec) -> Self {
        self.remote = remote;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Subscribes to events of the bridge and all its devices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Returns the event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Verifies and repairs the interpreter environment.
    ///
    /// Must complete before the first device is added. Blocks, repeating a
    /// warning, while the environment cannot be fixed automatically.
    ///
    /// # Errors
    ///
    /// Returns `Error::Environment` if the package index client cannot be
    /// created.
    pub async fn prepare_environment(&self) -> Result<EnvironmentReport, Error> {
        let checker = EnvironmentChecker::new(self.config.checker_options())?;
        Ok(checker.ensure().await)
    }

    /// Adds a device, pairing it first if it has no stored credentials.
    ///
    /// Adding a device that is already present returns the existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials cannot be loaded, obtained or saved.
    pub async fn add_device(&self, identity: DeviceIdentity) -> Result<Arc<AppleTvDevice>, Error> {
        if let Some(existing) = self.device(&identity.id).await {
            return Ok(existing);
        }

        let started = AppleTvDevice::start(
            identity,
            &self.store,
            self.pairer.as_ref(),
            self.remote.clone(),
            self.events.clone(),
        )
        .await?;
        let id = started.id().clone();

        let mut devices = self.devices.write().await;
        if let Some(existing) = devices.get(&id) {
            return Ok(Arc::clone(existing));
        }
        let device = Arc::new(started);
        devices.insert(id.clone(), Arc::clone(&device));
        drop(devices);

        tracing::info!(device = %id, "device added");
        self.events.publish(BridgeEvent::DeviceAdded { device: id });
        Ok(device)
    }

    /// Removes a device.
    ///
    /// Its control channel closes once the last handle to it is dropped.
    /// Returns `true` if the device was present.
    pub async fn remove_device(&self, id: &DeviceId) -> bool {
        let removed = self.devices.write().await.remove(id).is_some();
        if removed {
            tracing::info!(device = %id, "device removed");
            self.events
                .publish(BridgeEvent::DeviceRemoved { device: id.clone() });
        }
        removed
    }

    /// Returns a device by id.
    pub async fn device(&self, id: &DeviceId) -> Option<Arc<AppleTvDevice>> {
        self.devices.read().await.get(id).cloned()
    }

    /// Returns the ids of all devices.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Returns the number of devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Sends a remote command to a device.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown id, or `Error::Channel`
    /// if the device's channel is not open.
    pub async fn send(&self, id: &DeviceId, command: RemoteCommand) -> Result<(), Error> {
        let device = self.device(id).await.ok_or(Error::DeviceNotFound)?;
        device.send(command).await
    }
}
