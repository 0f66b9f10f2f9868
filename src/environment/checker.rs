// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Verification and repair of the interpreter environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::package_index::{DEFAULT_INDEX_URL, PackageIndex};
use super::requirements::{Manifest, RuntimeRequirements, normalize_name};
use super::Version;
use crate::credentials::STORAGE_DIR;
use crate::error::EnvironmentError;
use crate::process::{CommandExecutor, ProcessOutput, ProcessRunner, ProcessSpec};

/// Interpreter used when none is configured.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Name of the isolated environment directory inside the bridge storage.
pub const VENV_DIR: &str = ".venv";

/// Name of the rendered requirements file inside the bridge storage.
pub const MANIFEST_FILE: &str = "requirements.txt";

/// How often a blocked environment is re-checked and the warning repeated.
pub const BLOCKED_RECHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Output of a venv creation that failed because the venv module is missing.
const VENV_UNAVAILABLE_SIGNATURE: &str = "ensurepip is not available";

const TLS_PROBE: &str = "import ssl; print(ssl.OPENSSL_VERSION)";

const RUNTIME_HOME_PROBE: &str = "import sys; print(sys.base_prefix)";

/// Where and with what the environment is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOptions {
    storage_path: PathBuf,
    interpreter: PathBuf,
    force_recreate: bool,
    index_url: String,
}

impl CheckerOptions {
    /// Options for the bridge storage under `storage_path`.
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            force_recreate: false,
            index_url: DEFAULT_INDEX_URL.to_string(),
        }
    }

    /// Uses `interpreter` instead of [`DEFAULT_INTERPRETER`].
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Recreates the isolated environment even if it looks healthy.
    #[must_use]
    pub fn with_force_recreate(mut self, force: bool) -> Self {
        self.force_recreate = force;
        self
    }

    /// Queries another package index.
    #[must_use]
    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    /// Returns the bridge's own directory inside the storage path.
    #[must_use]
    pub fn bridge_dir(&self) -> PathBuf {
        self.storage_path.join(STORAGE_DIR)
    }

    /// Returns the isolated environment directory.
    #[must_use]
    pub fn venv_dir(&self) -> PathBuf {
        self.bridge_dir().join(VENV_DIR)
    }

    /// Returns the isolated environment's interpreter.
    #[must_use]
    pub fn venv_interpreter(&self) -> PathBuf {
        self.venv_dir().join("bin").join("python3")
    }

    /// Returns the system interpreter.
    #[must_use]
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }
}

/// What a successful check found and changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Detected TLS library version.
    pub tls: Option<Version>,
    /// Detected system interpreter version.
    pub interpreter: Version,
    /// Installed manifest.
    pub manifest: Manifest,
    /// Whether the isolated environment was (re)created.
    pub venv_created: bool,
    /// Whether the package manager was updated.
    pub package_manager_updated: bool,
    /// Whether the manifest was installed.
    pub packages_installed: bool,
}

impl EnvironmentReport {
    /// Returns true if the check changed nothing.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        !self.venv_created && !self.package_manager_updated && !self.packages_installed
    }
}

#[derive(Debug, Deserialize)]
struct InstalledPackage {
    name: String,
    version: String,
}

/// Makes sure the interpreter environment the device tools need is usable.
///
/// Every step looks before it acts, so a satisfied environment is left
/// untouched.
///
/// ```text
/// TLS version ─► interpreter range ─► venv present / runtime home ─► pip ─► manifest
///   (selects                (fatal)        (recreate; missing venv
///    legacy)                                module is fatal)
/// ```
#[derive(Debug)]
pub struct EnvironmentChecker<E = ProcessRunner> {
    executor: E,
    index: PackageIndex,
    options: CheckerOptions,
}

impl EnvironmentChecker<ProcessRunner> {
    /// Creates a checker that runs real processes.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::PackageIndex` if the HTTP client cannot be
    /// created.
    pub fn new(options: CheckerOptions) -> Result<Self, EnvironmentError> {
        Self::with_executor(options, ProcessRunner)
    }
}

impl<E: CommandExecutor> EnvironmentChecker<E> {
    /// Creates a checker that runs commands through `executor`.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::PackageIndex` if the HTTP client cannot be
    /// created.
    pub fn with_executor(options: CheckerOptions, executor: E) -> Result<Self, EnvironmentError> {
        let index = PackageIndex::new(options.index_url.clone())?;
        Ok(Self {
            executor,
            index,
            options,
        })
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    /// Runs every step once.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; [`EnvironmentError::is_fatal`]
    /// tells whether user action is needed.
    pub async fn check(&self) -> Result<EnvironmentReport, EnvironmentError> {
        let tls = self.tls_version().await;
        let requirements = RuntimeRequirements::for_tls(tls);
        if requirements.manifest() == Manifest::Legacy {
            tracing::info!(tls = ?tls.map(|v| v.to_string()), "old or unknown TLS library, using legacy manifest");
        }

        let interpreter = self.interpreter_version(&requirements).await?;
        let venv_created = self.ensure_venv().await?;
        let package_manager_updated = self.update_package_manager().await?;
        let packages_installed = self.sync_packages(requirements.manifest()).await?;

        let report = EnvironmentReport {
            tls,
            interpreter,
            manifest: requirements.manifest(),
            venv_created,
            package_manager_updated,
            packages_installed,
        };
        tracing::info!(
            interpreter = %report.interpreter,
            changed = !report.is_unchanged(),
            "environment ready"
        );
        Ok(report)
    }

    /// Runs [`check`](Self::check) until it succeeds.
    ///
    /// Does not return while the environment is broken: the actionable
    /// warning is repeated and the check re-run every
    /// [`BLOCKED_RECHECK_INTERVAL`].
    pub async fn ensure(&self) -> EnvironmentReport {
        loop {
            match self.check().await {
                Ok(report) => return report,
                Err(e) if e.is_fatal() => {
                    tracing::warn!(error = %e, "environment is not usable, device setup is blocked until this is fixed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "environment check failed, retrying later");
                }
            }
            tokio::time::sleep(BLOCKED_RECHECK_INTERVAL).await;
        }
    }

    /// Step 1. Unknown when the probe fails or prints no version.
    async fn tls_version(&self) -> Option<Version> {
        let spec = ProcessSpec::new(self.options.interpreter()).args(["-c", TLS_PROBE]);
        match self.executor.run(&spec).await {
            Ok(output) if output.success() => Version::find_in(&output.stdout),
            Ok(output) => {
                tracing::debug!(code = ?output.code, "TLS probe failed");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "TLS probe could not run");
                None
            }
        }
    }

    /// Step 2.
    async fn interpreter_version(
        &self,
        requirements: &RuntimeRequirements,
    ) -> Result<Version, EnvironmentError> {
        let spec = ProcessSpec::new(self.options.interpreter()).arg("--version");
        let output = self.executor.run(&spec).await?;
        let text = output.combined();
        let version = Version::find_in(&text)
            .ok_or_else(|| EnvironmentError::UnknownInterpreter(text.trim().to_string()))?;

        if !requirements.supports(&version) {
            return Err(EnvironmentError::UnsupportedInterpreter {
                found: version.to_string(),
                supported: requirements.supported_list(),
            });
        }
        tracing::debug!(%version, "interpreter supported");
        Ok(version)
    }

    /// Steps 3 and 4. Returns true if the environment was (re)created.
    async fn ensure_venv(&self) -> Result<bool, EnvironmentError> {
        let venv_python = self.options.venv_interpreter();
        let present = tokio::fs::try_exists(&venv_python).await.unwrap_or(false);

        let clear = if self.options.force_recreate {
            tracing::info!("recreating environment on request");
            true
        } else if !present {
            tracing::info!(path = %self.options.venv_dir().display(), "creating environment");
            false
        } else if self.runtime_home_matches(&venv_python).await? {
            return Ok(false);
        } else {
            tracing::info!("environment belongs to another interpreter, recreating");
            true
        };

        self.create_venv(clear).await?;
        Ok(true)
    }

    async fn runtime_home_matches(&self, venv_python: &Path) -> Result<bool, EnvironmentError> {
        let system = self
            .run_checked(ProcessSpec::new(self.options.interpreter()).args(["-c", RUNTIME_HOME_PROBE]))
            .await?;
        let venv = self
            .executor
            .run(&ProcessSpec::new(venv_python).args(["-c", RUNTIME_HOME_PROBE]))
            .await;

        Ok(match venv {
            Ok(venv) if venv.success() => venv.stdout.trim() == system.stdout.trim(),
            _ => false,
        })
    }

    async fn create_venv(&self, clear: bool) -> Result<(), EnvironmentError> {
        let bridge_dir = self.options.bridge_dir();
        tokio::fs::create_dir_all(&bridge_dir)
            .await
            .map_err(|source| EnvironmentError::Io {
                path: bridge_dir.clone(),
                source,
            })?;

        let mut spec = ProcessSpec::new(self.options.interpreter()).args(["-m", "venv"]);
        if clear {
            spec = spec.arg("--clear");
        }
        let spec = spec.arg(self.options.venv_dir().display().to_string());

        let output = self.executor.run(&spec).await?;
        if output.success() {
            return Ok(());
        }
        if output.combined().contains(VENV_UNAVAILABLE_SIGNATURE) {
            return Err(EnvironmentError::EnvironmentUnavailable {
                remedy: format!(
                    "the venv module of {} is missing; install it (for example `apt install python3-venv`) and restart",
                    self.options.interpreter().display()
                ),
            });
        }
        Err(command_failed(&spec, &output))
    }

    /// Step 5. An unreachable index skips the update.
    async fn update_package_manager(&self) -> Result<bool, EnvironmentError> {
        let version_spec = self.pip().arg("--version");
        let output = self.run_checked(version_spec.clone()).await?;
        let installed = Version::find_in(&output.stdout).ok_or_else(|| {
            EnvironmentError::UnexpectedOutput {
                command: version_spec.to_string(),
                message: "no version in output".to_string(),
            }
        })?;

        let latest = match self.index.latest_version("pip").await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(error = %e, "could not look up latest pip, skipping update");
                return Ok(false);
            }
        };
        if installed >= latest {
            return Ok(false);
        }

        tracing::info!(%installed, %latest, "updating pip");
        self.run_checked(self.pip().args(["install", "--upgrade", "pip"]))
            .await?;
        Ok(true)
    }

    /// Step 6. Returns true if the manifest was installed.
    async fn sync_packages(&self, manifest: Manifest) -> Result<bool, EnvironmentError> {
        let list_spec = self.pip().args(["list", "--format=json"]);
        let output = self.run_checked(list_spec.clone()).await?;
        let installed: Vec<InstalledPackage> =
            serde_json::from_str(output.stdout.trim()).map_err(|e| EnvironmentError::UnexpectedOutput {
                command: list_spec.to_string(),
                message: e.to_string(),
            })?;
        let installed: HashMap<String, String> = installed
            .into_iter()
            .map(|package| (normalize_name(&package.name), package.version))
            .collect();

        let mismatched: Vec<&str> = manifest
            .pins()
            .iter()
            .filter(|(name, version)| {
                installed.get(&normalize_name(name)).map(String::as_str) != Some(*version)
            })
            .map(|(name, _)| *name)
            .collect();
        if mismatched.is_empty() {
            return Ok(false);
        }

        tracing::info!(packages = ?mismatched, "installing pinned packages");
        let path = self.options.bridge_dir().join(MANIFEST_FILE);
        tokio::fs::write(&path, manifest.render())
            .await
            .map_err(|source| EnvironmentError::Io {
                path: path.clone(),
                source,
            })?;

        self.run_checked(self.pip().args(["install", "-r"]).arg(path.display().to_string()))
            .await?;
        Ok(true)
    }

    fn pip(&self) -> ProcessSpec {
        ProcessSpec::new(self.options.venv_interpreter()).args(["-m", "pip"])
    }

    async fn run_checked(&self, spec: ProcessSpec) -> Result<ProcessOutput, EnvironmentError> {
        let output = self.executor.run(&spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(command_failed(&spec, &output))
        }
    }
}

fn command_failed(spec: &ProcessSpec, output: &ProcessOutput) -> EnvironmentError {
    EnvironmentError::CommandFailed {
        command: spec.to_string(),
        code: output.code,
        output: output.combined().trim().to_string(),
    }
}
