// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The power-on grace window.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// How long after a power-on command power-off signals are ignored.
pub const GRACE_WINDOW: Duration = Duration::from_millis(7500);

#[derive(Debug, Default)]
struct WindowState {
    last_power_on: Option<Instant>,
    turning_on: bool,
}

/// Timestamp of the last power-on command and the turning-on flag.
///
/// This is the one piece of mutable state shared between the power command
/// path and the event handlers of a device. Only
/// [`begin_power_on`](Self::begin_power_on) writes it; everything else reads.
#[derive(Debug, Default)]
pub struct PowerOnWindow {
    state: Mutex<WindowState>,
}

impl PowerOnWindow {
    /// Creates a window with no power-on recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a power-on command now and raises the turning-on flag.
    ///
    /// The flag is cleared when the returned guard is dropped.
    #[must_use = "dropping the guard clears the turning-on flag immediately"]
    pub fn begin_power_on(&self) -> TurningOnGuard<'_> {
        let mut state = self.state.lock();
        state.last_power_on = Some(Instant::now());
        state.turning_on = true;
        TurningOnGuard { window: self }
    }

    /// Returns true while a power-on command is waiting for the device.
    #[must_use]
    pub fn is_turning_on(&self) -> bool {
        self.state.lock().turning_on
    }

    /// Returns when the last power-on command was issued.
    #[must_use]
    pub fn last_power_on(&self) -> Option<Instant> {
        self.state.lock().last_power_on
    }

    /// Returns true if less than [`GRACE_WINDOW`] has passed since the last
    /// power-on command.
    #[must_use]
    pub fn within_grace(&self) -> bool {
        self.last_power_on()
            .is_some_and(|at| at.elapsed() < GRACE_WINDOW)
    }

    fn finish(&self) {
        self.state.lock().turning_on = false;
    }
}

/// Clears the turning-on flag of a [`PowerOnWindow`] when dropped.
#[derive(Debug)]
pub struct TurningOnGuard<'a> {
    window: &'a PowerOnWindow,
}

impl Drop for TurningOnGuard<'_> {
    fn drop(&mut self) {
        self.window.finish();
    }
}
