// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dotted version numbers as printed by interpreters and libraries.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// A `major.minor.patch` version.
///
/// Missing components are zero; non-numeric suffixes (`1.1.1w`, `3.12.0rc1`)
/// are ignored.
///
/// # Examples
///
/// ```
/// use atv_bridge::environment::Version;
///
/// let v = Version::find_in("Python 3.11.4").unwrap();
/// assert_eq!(v, Version::new(3, 11, 4));
/// assert!(v > "3.9".parse().unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl Version {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a version token such as `3.11.4` or `1.1.1w`.
    ///
    /// Returns `None` unless the token starts with a digit.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.trim().split('.').map(leading_number);
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// Finds the first dotted version in free text like
    /// `OpenSSL 3.0.2 15 Mar 2022` or `pip 23.0.1 from /venv (python 3.11)`.
    #[must_use]
    pub fn find_in(text: &str) -> Option<Self> {
        text.split_whitespace()
            .filter(|word| word.contains('.'))
            .find_map(Self::parse)
    }

    /// Returns true if both versions share major and minor.
    #[must_use]
    pub fn same_minor(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

fn leading_number(part: &str) -> Option<u64> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ValueError::Unknown {
            kind: "version",
            value: s.to_string(),
        })
    }
}
