// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of pairing subprocess output.

use std::time::Duration;

use crate::credentials::Credentials;

/// Printed when the device shows a PIN and the tool waits for it.
pub const PIN_PROMPT_MARKER: &str = "Enter PIN on screen";

/// Precedes the number of seconds the device asks us to wait.
pub const BACKOFF_MARKER: &str = "BackOff=";

/// Matched case-insensitively anywhere in a line.
pub const ERROR_MARKER: &str = "error";

/// Precedes the credentials on success.
pub const SUCCESS_MARKER: &str = "You may now use these credentials:";

/// Added to every backoff the device requests.
pub const BACKOFF_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// What a line of pairing output means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutput {
    /// The device displays a PIN; the user has to enter it.
    PinPrompt,
    /// The device is rate limiting; wait this long (margin included) before retrying.
    BackOff(Duration),
    /// The attempt failed.
    Error,
    /// Pairing succeeded with these credentials.
    Success(Credentials),
    /// The line carries no marker.
    Other,
}

impl PairingOutput {
    /// Returns true if the line ends the waiting phase of an attempt.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Classifies one line of pairing output.
///
/// Markers are checked in a fixed order and the first match wins: PIN prompt,
/// backoff, error, success. A backoff line usually also contains the word
/// "error", so the order matters.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use atv_bridge::pairing::{PairingOutput, classify};
///
/// assert_eq!(classify("Enter PIN on screen: "), PairingOutput::PinPrompt);
/// assert_eq!(
///     classify("Pairing error: BackOff=12s"),
///     PairingOutput::BackOff(Duration::from_secs(17))
/// );
/// ```
#[must_use]
pub fn classify(line: &str) -> PairingOutput {
    if line.contains(PIN_PROMPT_MARKER) {
        return PairingOutput::PinPrompt;
    }

    if let Some(pos) = line.find(BACKOFF_MARKER) {
        let rest = &line[pos + BACKOFF_MARKER.len()..];
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let seconds = digits.parse::<u64>().unwrap_or(0);
        return PairingOutput::BackOff(Duration::from_secs(seconds) + BACKOFF_SAFETY_MARGIN);
    }

    if line.to_ascii_lowercase().contains(ERROR_MARKER) {
        return PairingOutput::Error;
    }

    if let Some(pos) = line.find(SUCCESS_MARKER) {
        let credentials = Credentials::new(&line[pos + SUCCESS_MARKER.len()..]);
        if credentials.is_empty() {
            return PairingOutput::Error;
        }
        return PairingOutput::Success(credentials);
    }

    PairingOutput::Other
}
