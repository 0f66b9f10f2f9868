// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle events for bridged devices.
//!
//! The [`EventBus`] uses tokio's broadcast channel so several subscribers
//! (the host, tests, a status page) can follow pairing, channel and
//! connectivity changes of every device.
//!
//! # Examples
//!
//! ```
//! use atv_bridge::event::{BridgeEvent, EventBus};
//! use atv_bridge::types::DeviceId;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! let device = DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap();
//! bus.publish(BridgeEvent::DeviceAdded { device });
//! ```

mod bridge_event;
mod event_bus;

pub use bridge_event::BridgeEvent;
pub use event_bus::EventBus;
