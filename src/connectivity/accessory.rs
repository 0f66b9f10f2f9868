// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seams to the accessory framework and the device command surface.

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::types::{MediaType, PlaybackState, PowerState};

/// The accessory characteristics the monitor writes.
///
/// Implemented by the host's accessory layer. Calls must not block.
pub trait Accessory: Send + Sync {
    /// Returns the current active characteristic.
    fn is_active(&self) -> bool;

    /// Updates the active characteristic.
    fn set_active(&self, power: PowerState);

    /// Turns the indicator for a playback state on or off.
    fn set_device_state_indicator(&self, state: PlaybackState, on: bool);

    /// Turns the indicator for a media type on or off.
    fn set_media_type_indicator(&self, media: MediaType, on: bool);
}

/// Current values queried from the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    /// Playback state, if the device reported one.
    pub device_state: Option<PlaybackState>,
    /// Media type, if the device reported one.
    pub media_type: Option<MediaType>,
}

/// The device command surface used by the power paths.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Wakes the device.
    async fn turn_on(&self) -> Result<(), DeviceError>;

    /// Puts the device in standby.
    async fn turn_off(&self) -> Result<(), DeviceError>;

    /// Queries the current playback state and media type.
    async fn state(&self) -> Result<DeviceSnapshot, DeviceError>;
}
