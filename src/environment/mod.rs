// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The interpreter environment the pairing and control tools run in.
//!
//! [`EnvironmentChecker::ensure`] runs once before any device is set up. It
//! checks the TLS library and interpreter, keeps an isolated package
//! environment under the bridge storage, and installs the pinned tool
//! versions into it.

mod checker;
mod package_index;
mod requirements;
mod version;

pub use checker::{
    BLOCKED_RECHECK_INTERVAL, CheckerOptions, DEFAULT_INTERPRETER, EnvironmentChecker,
    EnvironmentReport, MANIFEST_FILE, VENV_DIR,
};
pub use package_index::{DEFAULT_INDEX_URL, PackageIndex};
pub use requirements::{MINIMUM_TLS_VERSION, Manifest, RuntimeRequirements, normalize_name};
pub use version::Version;
