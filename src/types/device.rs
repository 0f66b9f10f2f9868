// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity types.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Stable identifier of an Apple TV, usually its MAC address.
///
/// The identifier is the key for all per-device state on disk.
///
/// # Examples
///
/// ```
/// use atv_bridge::types::DeviceId;
///
/// let id = DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap();
/// assert_eq!(id.storage_key(), "AABBCCDDEEFF");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` if the identifier is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, ValueError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier with separators stripped, for use as a directory name.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.0
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Everything known about a discovered device.
///
/// Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Stable identifier.
    pub id: DeviceId,
    /// Network host or IPv4 address.
    pub host: String,
    /// Display name.
    pub name: String,
    /// Model string, if reported.
    pub model: Option<String>,
    /// Firmware version, if reported.
    pub firmware: Option<String>,
}

impl DeviceIdentity {
    /// Creates an identity with no model or firmware information.
    #[must_use]
    pub fn new(id: DeviceId, host: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            host: host.into(),
            name: name.into(),
            model: None,
            firmware: None,
        }
    }

    /// Sets the model string.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the firmware version.
    #[must_use]
    pub fn with_firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = Some(firmware.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_strips_separators() {
        let id = DeviceId::new("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(id.storage_key(), "aabbccddeeff");
        assert_eq!(id.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn blank_identifier_is_rejected() {
        assert_eq!(DeviceId::new("  "), Err(ValueError::EmptyIdentifier));
    }

    #[test]
    fn identifier_is_trimmed() {
        let id: DeviceId = " 11-22-33 ".parse().unwrap();
        assert_eq!(id.to_string(), "11-22-33");
        assert_eq!(id.storage_key(), "112233");
    }

    #[test]
    fn identity_builder() {
        let identity = DeviceIdentity::new(DeviceId::new("X").unwrap(), "10.0.0.5", "Den")
            .with_model("AppleTV14,1")
            .with_firmware("17.4");
        assert_eq!(identity.model.as_deref(), Some("AppleTV14,1"));
        assert_eq!(identity.firmware.as_deref(), Some("17.4"));
    }
}
