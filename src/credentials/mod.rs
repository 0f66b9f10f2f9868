// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-lived device credentials and their on-disk store.
//!
//! Credentials are produced once by pairing and reused for every subsequent
//! control-channel session. They are secrets: the [`Credentials`] type never
//! prints its contents.

mod store;

pub use store::{CREDENTIALS_FILE, CredentialStore, STORAGE_DIR};

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Opaque pairing credentials, usable for both the control and pairing channels.
///
/// # Examples
///
/// ```
/// use atv_bridge::credentials::Credentials;
///
/// let creds = Credentials::new("  a1b2:c3d4\n");
/// assert_eq!(creds.expose(), "a1b2:c3d4");
/// assert_eq!(format!("{creds:?}"), "Credentials(<redacted>)");
/// ```
#[derive(Clone)]
pub struct Credentials(SecretString);

impl Credentials {
    /// Wraps a credential string, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(SecretString::from(value.trim().to_string()))
    }

    /// Returns the credential string.
    ///
    /// Only call this to hand the value to a subprocess or to persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns true if the credential string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credentials {}
