// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge and per-device lifecycle.
//!
//! # Overview
//!
//! The [`Bridge`] is the entry point for a host:
//!
//! 1. [`Bridge::prepare_environment`] once at startup
//! 2. [`Bridge::add_device`] for each discovered Apple TV, which loads or
//!    pairs credentials and starts a supervised control channel
//! 3. [`AppleTvDevice::monitor`] to mirror the device event stream into the
//!    host's accessory
//!
//! Events for all of this are published on one [`EventBus`](crate::event::EventBus).

mod apple_tv;
mod bridge;
mod bridge_config;

pub use apple_tv::{AppleTvDevice, RECONNECT_DELAY};
pub use bridge::Bridge;
pub use bridge_config::{BridgeConfig, REMOTE_TOOL};
