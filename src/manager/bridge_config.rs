// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialStore, STORAGE_DIR};
use crate::environment::{CheckerOptions, DEFAULT_INDEX_URL, DEFAULT_INTERPRETER, VENV_DIR};
use crate::error::Error;
use crate::process::ProcessSpec;

/// Name of the remote-control tool inside the isolated environment.
pub const REMOTE_TOOL: &str = "atvremote";

/// Configuration of a bridge, as found in the host's JSON config.
///
/// Only `storagePath` is required.
///
/// # Examples
///
/// ```
/// use atv_bridge::manager::BridgeConfig;
///
/// let config = BridgeConfig::from_json(r#"{
///     "storagePath": "/var/lib/homebridge",
///     "pythonExecutable": "/usr/bin/python3.11"
/// }"#).unwrap();
///
/// assert_eq!(
///     config.remote_executable().to_str(),
///     Some("/var/lib/homebridge/atv-bridge/.venv/bin/atvremote")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Host storage directory; the bridge keeps its files in a subdirectory.
    pub storage_path: PathBuf,

    /// Interpreter used to build the isolated environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_executable: Option<PathBuf>,

    /// Recreate the isolated environment on every start.
    #[serde(default)]
    pub force_venv_recreate: bool,

    /// Remote-control executable, if not the one in the isolated environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_executable: Option<PathBuf>,

    /// Package index JSON API used for update checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_index_url: Option<String>,
}

impl BridgeConfig {
    /// Creates a configuration with defaults for everything but the storage
    /// path.
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            python_executable: None,
            force_venv_recreate: false,
            remote_executable: None,
            package_index_url: None,
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the JSON is malformed or `storagePath` is
    /// missing.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the interpreter.
    #[must_use]
    pub fn with_python_executable(mut self, python: impl Into<PathBuf>) -> Self {
        self.python_executable = Some(python.into());
        self
    }

    /// Sets whether the isolated environment is always recreated.
    #[must_use]
    pub fn with_force_venv_recreate(mut self, force: bool) -> Self {
        self.force_venv_recreate = force;
        self
    }

    /// Sets the remote-control executable.
    #[must_use]
    pub fn with_remote_executable(mut self, remote: impl Into<PathBuf>) -> Self {
        self.remote_executable = Some(remote.into());
        self
    }

    /// Sets the package index URL.
    #[must_use]
    pub fn with_package_index_url(mut self, url: impl Into<String>) -> Self {
        self.package_index_url = Some(url.into());
        self
    }

    /// Returns the isolated environment directory.
    #[must_use]
    pub fn venv_dir(&self) -> PathBuf {
        self.storage_path.join(STORAGE_DIR).join(VENV_DIR)
    }

    /// Returns the remote-control executable.
    #[must_use]
    pub fn remote_executable(&self) -> PathBuf {
        self.remote_executable
            .clone()
            .unwrap_or_else(|| self.venv_dir().join("bin").join(REMOTE_TOOL))
    }

    /// Returns the base command of the pairing and control processes.
    #[must_use]
    pub fn remote_spec(&self) -> ProcessSpec {
        ProcessSpec::new(self.remote_executable())
    }

    /// Returns the credential store under the storage path.
    #[must_use]
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(&self.storage_path)
    }

    /// Returns the environment checker options.
    #[must_use]
    pub fn checker_options(&self) -> CheckerOptions {
        CheckerOptions::new(&self.storage_path)
            .with_interpreter(
                self.python_executable
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER)),
            )
            .with_force_recreate(self.force_venv_recreate)
            .with_index_url(
                self.package_index_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            )
    }
}
