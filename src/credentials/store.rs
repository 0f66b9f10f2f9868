// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device credential persistence.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Credentials;
use crate::error::CredentialError;
use crate::types::DeviceId;

/// Name of the bridge's directory inside the host storage path.
pub const STORAGE_DIR: &str = "atv-bridge";

/// Name of the credentials file inside a device directory.
pub const CREDENTIALS_FILE: &str = "credentials.txt";

/// Reads and writes the credentials artifact of each device.
///
/// Layout:
///
/// ```text
/// <storage>/atv-bridge/
///   AABBCCDDEEFF/
///     credentials.txt
/// ```
///
/// The per-device directory also holds the display-name override documents
/// owned by the accessory configuration layer.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Creates a store rooted at `<storage_path>/atv-bridge`.
    #[must_use]
    pub fn new(storage_path: impl AsRef<Path>) -> Self {
        Self {
            root: storage_path.as_ref().join(STORAGE_DIR),
        }
    }

    /// Returns the bridge's storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding all state of one device.
    #[must_use]
    pub fn device_dir(&self, device: &DeviceId) -> PathBuf {
        self.root.join(device.storage_key())
    }

    /// Returns the path of a device's credentials file.
    #[must_use]
    pub fn credentials_path(&self, device: &DeviceId) -> PathBuf {
        self.device_dir(device).join(CREDENTIALS_FILE)
    }

    /// Loads the stored credentials of a device.
    ///
    /// Returns `Ok(None)` if the device was never paired or the file is blank.
    /// The device directory is created if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the directory cannot be created or the
    /// file cannot be read.
    pub async fn load(&self, device: &DeviceId) -> Result<Option<Credentials>, CredentialError> {
        self.ensure_device_dir(device).await?;

        let path = self.credentials_path(device);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let credentials = Credentials::new(&contents);
                if credentials.is_empty() {
                    tracing::debug!(%device, "credentials file is empty");
                    Ok(None)
                } else {
                    Ok(Some(credentials))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Read { path, source }),
        }
    }

    /// Persists the credentials of a device, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the directory cannot be created or the
    /// file cannot be written.
    pub async fn save(
        &self,
        device: &DeviceId,
        credentials: &Credentials,
    ) -> Result<(), CredentialError> {
        self.ensure_device_dir(device).await?;

        let path = self.credentials_path(device);
        tokio::fs::write(&path, credentials.expose())
            .await
            .map_err(|source| CredentialError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(%device, path = %path.display(), "saved credentials");
        Ok(())
    }

    async fn ensure_device_dir(&self, device: &DeviceId) -> Result<(), CredentialError> {
        let dir = self.device_dir(device);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| CredentialError::CreateDir { path: dir, source })
    }
}
