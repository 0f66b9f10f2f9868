// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote-control command vocabulary.

use std::fmt;

/// A command accepted by the interactive control process.
///
/// The vocabulary is closed: every command the bridge can send is a variant
/// here, so an unrecognised command cannot be constructed at runtime.
///
/// # Examples
///
/// ```
/// use atv_bridge::types::RemoteCommand;
///
/// assert_eq!(RemoteCommand::PlayPause.as_str(), "play_pause");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    /// Navigate up.
    Up,
    /// Navigate down.
    Down,
    /// Navigate left.
    Left,
    /// Navigate right.
    Right,
    /// Select the focused item.
    Select,
    /// Back / menu.
    Menu,
    /// Go to the home screen.
    Home,
    /// Long-press home (control center).
    HomeHold,
    /// Go to the top menu of the current app.
    TopMenu,
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Toggle between play and pause.
    PlayPause,
    /// Stop playback.
    Stop,
    /// Next item.
    Next,
    /// Previous item.
    Previous,
    /// Skip forward within the item.
    SkipForward,
    /// Skip backward within the item.
    SkipBackward,
    /// Raise volume.
    VolumeUp,
    /// Lower volume.
    VolumeDown,
    /// Wake the device.
    TurnOn,
    /// Put the device into standby.
    TurnOff,
    /// List installed apps. Used as the keep-alive heartbeat.
    AppList,
}

impl RemoteCommand {
    /// Returns the command word written to the control process.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Select => "select",
            Self::Menu => "menu",
            Self::Home => "home",
            Self::HomeHold => "home_hold",
            Self::TopMenu => "top_menu",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::PlayPause => "play_pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::SkipForward => "skip_forward",
            Self::SkipBackward => "skip_backward",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::AppList => "app_list",
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
