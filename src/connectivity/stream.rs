// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages delivered by a device event stream.

use crate::error::StreamError;
use crate::types::{MediaType, PlaybackState, PowerState};

/// A typed change of one value on the device.
///
/// Either side may be absent: the stream reports `None` while a value is
/// unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update<T> {
    /// The new value.
    pub value: Option<T>,
    /// The value before this change.
    pub old_value: Option<T>,
}

impl<T: PartialEq> Update<T> {
    /// Creates an update from `old_value` to `value`.
    pub fn new(value: Option<T>, old_value: Option<T>) -> Self {
        Self { value, old_value }
    }

    /// Returns true if the value did not change.
    pub fn is_unchanged(&self) -> bool {
        self.value == self.old_value
    }
}

/// One item from a device event stream.
///
/// Category messages carry either a typed update or an error shaped like
/// an event; the monitor drops the latter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// Power state category.
    Power(Result<Update<PowerState>, StreamError>),
    /// Playback device-state category.
    DeviceState(Result<Update<PlaybackState>, StreamError>),
    /// Media type category.
    MediaType(Result<Update<MediaType>, StreamError>),
    /// The stream's error channel.
    ConnectionError(StreamError),
}
