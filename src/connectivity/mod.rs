// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mirroring the device event stream into accessory state.
//!
//! The [`ConnectivityMonitor`] consumes power, playback and media events
//! from the device's event stream, tracks whether the stream is offline,
//! and swallows the spurious power-off events an Apple TV reports while it
//! wakes up. The only state it shares with the power commands is the
//! [`PowerOnWindow`].

mod accessory;
mod monitor;
mod power_window;
mod stream;

pub use accessory::{Accessory, DeviceControl, DeviceSnapshot};
pub use monitor::{
    ConnectivityMonitor, POWER_ON_POLL_INTERVAL, POWER_ON_TIMEOUT, PowerCommandOutcome,
    PowerOnOutcome,
};
pub use power_window::{GRACE_WINDOW, PowerOnWindow, TurningOnGuard};
pub use stream::{StreamMessage, Update};
