// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Description of a process to run.

use std::fmt;
use std::path::{Path, PathBuf};

/// Placeholder printed instead of secret arguments.
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    value: String,
    secret: bool,
}

/// Program and arguments of an external process.
///
/// Arguments added with [`secret_arg`](Self::secret_arg) are passed to the
/// process unchanged but printed as `<redacted>` by the `Display` impl, which
/// is what log messages use.
///
/// # Examples
///
/// ```
/// use atv_bridge::process::ProcessSpec;
///
/// let spec = ProcessSpec::new("atvremote")
///     .args(["--id", "AA:BB"])
///     .arg("--companion-credentials")
///     .secret_arg("s3cr3t");
///
/// assert_eq!(spec.to_string(), "atvremote --id AA:BB --companion-credentials <redacted>");
/// assert_eq!(spec.arg_values().last().map(String::as_str), Some("s3cr3t"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    program: PathBuf,
    args: Vec<Arg>,
}

impl ProcessSpec {
    /// Creates a spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(|value| Arg {
            value: value.into(),
            secret: false,
        }));
        self
    }

    /// Appends an argument that must never appear in logs.
    #[must_use]
    pub fn secret_arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: value.into(),
            secret: true,
        });
        self
    }

    /// Returns the program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the argument values, secrets included.
    #[must_use]
    pub fn arg_values(&self) -> Vec<String> {
        self.args.iter().map(|arg| arg.value.clone()).collect()
    }

    /// Returns true if any argument equals `value`.
    #[must_use]
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|arg| arg.value == value)
    }

    pub(crate) fn command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(self.args.iter().map(|arg| arg.value.as_str()));
        command
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.secret {
                write!(f, " {REDACTED}")?;
            } else {
                write!(f, " {}", arg.value)?;
            }
        }
        Ok(())
    }
}
