// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Playback status and media category types.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// High-level playback status of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Nothing is playing.
    Idle,
    /// Content is loading.
    Loading,
    /// Playback is paused.
    Paused,
    /// Content is playing.
    Playing,
    /// The user is seeking.
    Seeking,
    /// Playback was stopped.
    Stopped,
}

impl PlaybackState {
    /// All playback states, in indicator order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Loading,
        Self::Paused,
        Self::Playing,
        Self::Seeking,
        Self::Stopped,
    ];

    /// Returns the string used by the event stream.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Paused => "paused",
            Self::Playing => "playing",
            Self::Seeking => "seeking",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValueError::Unknown {
                kind: "device state",
                value: s.to_string(),
            })
    }
}

/// Category of the content currently presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// The device cannot tell.
    Unknown,
    /// Video content.
    Video,
    /// Music content.
    Music,
    /// Live TV.
    Tv,
}

impl MediaType {
    /// All media types, in indicator order.
    pub const ALL: [Self; 4] = [Self::Unknown, Self::Video, Self::Music, Self::Tv];

    /// Returns the string used by the event stream.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Video => "video",
            Self::Music => "music",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|media| media.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValueError::Unknown {
                kind: "media type",
                value: s.to_string(),
            })
    }
}
