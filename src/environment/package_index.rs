// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Latest published package versions.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::Version;
use crate::error::EnvironmentError;

/// Default package index JSON API.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

#[derive(Debug, Deserialize)]
struct IndexResponse {
    info: IndexInfo,
}

#[derive(Debug, Deserialize)]
struct IndexInfo {
    version: String,
}

/// Client for the package index JSON API (`GET {base}/{name}/json`).
#[derive(Debug, Clone)]
pub struct PackageIndex {
    base_url: String,
    client: Client,
}

impl PackageIndex {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client for the index at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::PackageIndex` if the HTTP client cannot be
    /// created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, EnvironmentError> {
        let client = Client::builder().timeout(Self::DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the index base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the latest published version of `package`.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::PackageIndex` if the request fails, or
    /// `EnvironmentError::UnexpectedOutput` if the version does not parse.
    pub async fn latest_version(&self, package: &str) -> Result<Version, EnvironmentError> {
        let url = format!("{}/{}/json", self.base_url, urlencoding::encode(package));
        tracing::debug!(%url, "querying package index");

        let response: IndexResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Version::parse(&response.info.version).ok_or_else(|| EnvironmentError::UnexpectedOutput {
            command: format!("GET {url}"),
            message: format!("unparseable version {:?}", response.info.version),
        })
    }
}
