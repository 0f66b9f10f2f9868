// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! First-time interactive pairing.
//!
//! Pairing runs only when a device has no stored credentials. The flow
//! combines two out-of-band channels:
//!
//! - a pairing subprocess that talks to the device and prints free-text
//!   markers (PIN prompt, backoff, error, success)
//! - a temporary local HTTP endpoint where the user types the PIN the TV shows
//!
//! ```text
//! spawn tool ─► serve PIN page ─► poll (100 ms) until marker + exit ─► close page
//!      ▲                                                    │
//!      └──────── backoff countdown / retry ◄── no success ──┘
//! ```
//!
//! The loop never gives up: pairing is a user-driven setup step.

mod coordinator;
mod output;
mod pin_server;
mod session;

pub use coordinator::{
    ATTEMPT_FAILURE_DELAY, BACKOFF_TICK, CALLBACK_PORT_BASE, COMPLETION_POLL_INTERVAL,
    PIN_REMINDER_INTERVAL, PairingCoordinator, WATCHDOG_TIMEOUT, backoff_countdown,
    callback_port,
};
pub use output::{
    BACKOFF_MARKER, BACKOFF_SAFETY_MARGIN, ERROR_MARKER, PIN_PROMPT_MARKER, PairingOutput,
    SUCCESS_MARKER, classify,
};
pub use pin_server::{PIN_CHAR_OFFSET, PIN_FIELDS, PinServer, extract_pin};
pub use session::{AttemptOutcome, PairingSession};

use async_trait::async_trait;

use crate::credentials::Credentials;
use crate::error::PairingError;

/// Something that can obtain credentials for a device.
///
/// [`PairingCoordinator`] is the production implementation.
#[async_trait]
pub trait Pairer: Send + Sync {
    /// Pairs with the device at `host` and returns its credentials.
    ///
    /// # Errors
    ///
    /// Returns `PairingError` if pairing cannot be carried out at all.
    async fn pair(&self, host: &str, display_name: &str) -> Result<Credentials, PairingError>;
}

#[async_trait]
impl Pairer for PairingCoordinator {
    async fn pair(&self, host: &str, display_name: &str) -> Result<Credentials, PairingError> {
        Self::pair(self, host, display_name).await
    }
}
