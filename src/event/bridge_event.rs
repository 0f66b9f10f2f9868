// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge event types.

use crate::types::DeviceId;

/// Events emitted by the bridge and its devices.
///
/// Every event names the device it concerns. Credentials never appear in an
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A device was added to the bridge.
    DeviceAdded {
        /// The added device.
        device: DeviceId,
    },

    /// A device was removed from the bridge.
    DeviceRemoved {
        /// The removed device.
        device: DeviceId,
    },

    /// No stored credentials were found and interactive pairing began.
    PairingStarted {
        /// The device being paired.
        device: DeviceId,
    },

    /// Pairing succeeded and the credentials were persisted.
    Paired {
        /// The paired device.
        device: DeviceId,
    },

    /// A control channel process was started.
    ChannelOpened {
        /// The device the channel controls.
        device: DeviceId,
    },

    /// The control channel process exited; a reconnect follows.
    ConnectionLost {
        /// The disconnected device.
        device: DeviceId,
        /// Exit code of the control process, if it exited normally.
        exit_code: Option<i32>,
    },

    /// The device event stream went offline or came back.
    OfflineChanged {
        /// The device whose stream changed.
        device: DeviceId,
        /// Whether the stream is now offline.
        offline: bool,
    },
}

impl BridgeEvent {
    /// Returns the device this event concerns.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        match self {
            Self::DeviceAdded { device }
            | Self::DeviceRemoved { device }
            | Self::PairingStarted { device }
            | Self::Paired { device }
            | Self::ChannelOpened { device }
            | Self::ConnectionLost { device, .. }
            | Self::OfflineChanged { device, .. } => device,
        }
    }
}
