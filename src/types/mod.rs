// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for Apple TV control.
//!
//! # Types
//!
//! - [`DeviceId`] / [`DeviceIdentity`] - Stable identity of a discovered device
//! - [`RemoteCommand`] - The fixed command vocabulary of the control channel
//! - [`PowerState`] - On/Off as reported by the event stream
//! - [`PlaybackState`] - High-level playback status ("device state")
//! - [`MediaType`] - Category of the content being presented

mod device;
mod playback;
mod power;
mod remote_command;

pub use device::{DeviceId, DeviceIdentity};
pub use playback::{MediaType, PlaybackState};
pub use power::PowerState;
pub use remote_command::RemoteCommand;
