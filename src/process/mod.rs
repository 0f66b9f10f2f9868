// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! External process execution.
//!
//! Every device operation that is not a pure state transition is delegated to
//! an external executable. [`ProcessRunner`] supports three modes:
//!
//! - [`ProcessRunner::output`]: capture stdout/stderr and wait for the exit code
//! - [`ProcessRunner::spawn`]: keep the process running, stream its output
//!   line by line and write to its input
//! - [`ProcessRunner::detach`]: fire-and-forget
//!
//! The [`CommandExecutor`] trait is the seam used by code that only needs the
//! capture-and-wait mode, so it can be exercised without real subprocesses.

mod runner;
mod spec;

pub use runner::{
    ExitWatch, OutputLine, OutputStream, ProcessExit, ProcessInput, ProcessOutput, ProcessRunner,
    RunningProcess,
};
pub use spec::ProcessSpec;

use std::future::Future;

use crate::error::ProcessError;

/// Runs a command to completion and captures its output.
pub trait CommandExecutor: Send + Sync {
    /// Runs the command described by `spec` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError` if the process cannot be started. A non-zero
    /// exit code is not an error; it is reported in [`ProcessOutput`].
    fn run(
        &self,
        spec: &ProcessSpec,
    ) -> impl Future<Output = Result<ProcessOutput, ProcessError>> + Send;
}

impl CommandExecutor for ProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        Self::output(spec).await
    }
}
