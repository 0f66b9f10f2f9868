// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Supported interpreter versions and pinned package manifests.

use super::Version;

/// Oldest TLS library that the standard manifest's wheels link against.
pub const MINIMUM_TLS_VERSION: Version = Version::new(1, 1, 1);

/// Supported interpreter minors, oldest first.
const SUPPORTED_INTERPRETERS: [(u64, u64); 5] = [(3, 9), (3, 10), (3, 11), (3, 12), (3, 13)];

const STANDARD_PINS: &[(&str, &str)] = &[("pyatv", "0.16.1")];

const LEGACY_PINS: &[(&str, &str)] = &[("pyatv", "0.16.1"), ("cryptography", "41.0.7")];

/// Which pinned dependency manifest to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manifest {
    /// Current pins.
    Standard,
    /// Pins that still build against an old TLS library.
    Legacy,
}

impl Manifest {
    /// Returns the `(name, version)` pins of this manifest.
    #[must_use]
    pub fn pins(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Standard => STANDARD_PINS,
            Self::Legacy => LEGACY_PINS,
        }
    }

    /// Renders the manifest in requirements-file format.
    #[must_use]
    pub fn render(&self) -> String {
        self.pins()
            .iter()
            .map(|(name, version)| format!("{name}=={version}\n"))
            .collect()
    }
}

/// Normalises a package name so `_` and `-` compare equal.
///
/// # Examples
///
/// ```
/// use atv_bridge::environment::normalize_name;
///
/// assert_eq!(normalize_name("Typing_Extensions"), "typing-extensions");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

/// What the runtime has to satisfy, decided once from the TLS check and then
/// passed through the remaining steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRequirements {
    supported: Vec<(u64, u64)>,
    manifest: Manifest,
}

impl Default for RuntimeRequirements {
    fn default() -> Self {
        Self {
            supported: SUPPORTED_INTERPRETERS.to_vec(),
            manifest: Manifest::Standard,
        }
    }
}

impl RuntimeRequirements {
    /// Derives requirements from the detected TLS library version.
    ///
    /// An unknown or too old TLS version selects the legacy manifest and
    /// drops the newest supported interpreter.
    #[must_use]
    pub fn for_tls(tls: Option<Version>) -> Self {
        match tls {
            Some(version) if version >= MINIMUM_TLS_VERSION => Self::default(),
            _ => Self::legacy(),
        }
    }

    /// Requirements for a system with an old TLS library.
    #[must_use]
    pub fn legacy() -> Self {
        let mut supported = SUPPORTED_INTERPRETERS.to_vec();
        supported.pop();
        Self {
            supported,
            manifest: Manifest::Legacy,
        }
    }

    /// Returns the manifest to install.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        self.manifest
    }

    /// Returns true if `interpreter` is a supported version.
    #[must_use]
    pub fn supports(&self, interpreter: &Version) -> bool {
        self.supported
            .iter()
            .any(|&(major, minor)| Version::new(major, minor, 0).same_minor(interpreter))
    }

    /// Returns the supported versions as `3.9, 3.10, ...`.
    #[must_use]
    pub fn supported_list(&self) -> String {
        self.supported
            .iter()
            .map(|(major, minor)| format!("{major}.{minor}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
