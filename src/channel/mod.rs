// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The long-lived remote-control channel of a device.
//!
//! A [`ControlChannel`] owns one interactive control process started with the
//! device id and credentials. Commands are written to its input one word per
//! line. A heartbeat keeps the connection alive, and the process exit is
//! reported once through [`ChannelClosed`]. Reconnection is the owner's job:
//! it opens a brand-new channel.

mod control_channel;

pub(crate) use control_channel::authenticated;
pub use control_channel::{ChannelClosed, CommandSender, ControlChannel, HEARTBEAT_INTERVAL};
