// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `atv_bridge` - Apple TV connectivity and pairing for a HomeKit bridge.
//!
//! This library keeps Apple TV devices controllable from a plugin host. The
//! remote-control protocol itself is spoken by an external tool; this crate
//! drives that tool as subprocesses.
//!
//! # Supported Features
//!
//! - **Environment**: verifies the interpreter, TLS library and an isolated
//!   package environment before any device is touched
//! - **Pairing**: interactive first-time pairing with a temporary PIN entry
//!   page, backoff and retry
//! - **Credentials**: per-device credential files, never logged
//! - **Control channel**: one long-lived control process per device with a
//!   heartbeat and automatic reconnection
//! - **Connectivity**: filters the device event stream and suppresses
//!   power-off flapping after a power-on
//!
//! # Quick Start
//!
//! ```no_run
//! use atv_bridge::manager::{Bridge, BridgeConfig};
//! use atv_bridge::types::{DeviceId, DeviceIdentity, RemoteCommand};
//!
//! #[tokio::main]
//! async fn main() -> atv_bridge::Result<()> {
//!     let bridge = Bridge::new(BridgeConfig::new("/var/lib/homebridge"));
//!
//!     // Blocks with a repeated warning while the environment is broken.
//!     bridge.prepare_environment().await?;
//!
//!     // Pairs on first use; the PIN page URL is logged at warn level.
//!     let id = DeviceId::new("AA:BB:CC:DD:EE:FF")?;
//!     let device = bridge
//!         .add_device(DeviceIdentity::new(id, "192.168.1.23", "Living Room"))
//!         .await?;
//!
//!     device.send(RemoteCommand::Home).await?;
//!     Ok(())
//! }
//! ```
//!
//! The library installs no `tracing` subscriber; the host does.

pub mod channel;
pub mod connectivity;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod event;
pub mod manager;
pub mod pairing;
pub mod process;
pub mod types;

pub use channel::{ChannelClosed, CommandSender, ControlChannel};
pub use connectivity::{Accessory, ConnectivityMonitor, DeviceControl, PowerOnWindow};
pub use credentials::{CredentialStore, Credentials};
pub use environment::{CheckerOptions, EnvironmentChecker, EnvironmentReport};
pub use error::{
    ChannelError, CredentialError, DeviceError, EnvironmentError, Error, PairingError,
    ProcessError, Result, StreamError, ValueError,
};
pub use event::{BridgeEvent, EventBus};
pub use manager::{AppleTvDevice, Bridge, BridgeConfig};
pub use pairing::{Pairer, PairingCoordinator};
pub use process::{ProcessRunner, ProcessSpec};
pub use types::{DeviceId, DeviceIdentity, MediaType, PlaybackState, PowerState, RemoteCommand};
