// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `atv_bridge` library.
//!
//! Each area of the bridge has its own error enum (subprocesses, pairing,
//! credential storage, control channel, runtime environment, devices) and all
//! of them convert into the top-level [`Error`].

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value parsing.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while running an external process.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// Error occurred during interactive pairing.
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Error occurred while reading or writing stored credentials.
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// Error occurred on the control channel.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Error occurred while verifying the external runtime.
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),

    /// Error occurred during device operations.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The bridge configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Device was not found in the bridge.
    #[error("device not found")]
    DeviceNotFound,
}

/// Errors related to parsing values reported by or sent to a device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A string did not name any known variant.
    #[error("unknown {kind}: {value}")]
    Unknown {
        /// The kind of value being parsed.
        kind: &'static str,
        /// The string that failed to parse.
        value: String,
    },

    /// A device identifier was empty.
    #[error("device identifier is empty")]
    EmptyIdentifier,
}

/// Errors related to spawning and talking to external processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing to the process input failed.
    #[error("failed to write to process input: {0}")]
    Input(#[source] std::io::Error),

    /// The process input has already been closed.
    #[error("process input is closed")]
    InputClosed,

    /// A standard stream was not captured.
    #[error("process stream {0} was not captured")]
    MissingStream(&'static str),
}

/// Errors related to the interactive pairing flow.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The device host is not a dotted IPv4 address.
    #[error("cannot derive a callback port from host {0}")]
    InvalidHost(String),

    /// The PIN endpoint could not bind its port.
    #[error("failed to bind PIN endpoint on port {port}: {source}")]
    Bind {
        /// The port that could not be bound.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The pairing subprocess could not be driven.
    #[error("pairing process failed: {0}")]
    Process(#[from] ProcessError),
}

/// Errors related to the on-disk credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Creating the per-device directory failed.
    #[error("failed to create {path}: {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the credentials file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the credentials file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to the long-lived control channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The control process could not be started or written to.
    #[error("control process error: {0}")]
    Process(#[from] ProcessError),

    /// The control channel is not open.
    #[error("control channel is not open")]
    NotOpen,
}

/// Errors related to the external runtime the device processes need.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The interpreter version is outside the supported range.
    #[error("interpreter version {found} is not supported (supported: {supported})")]
    UnsupportedInterpreter {
        /// The version that was found.
        found: String,
        /// Human-readable list of supported versions.
        supported: String,
    },

    /// The interpreter version could not be determined.
    #[error("could not determine interpreter version from output: {0}")]
    UnknownInterpreter(String),

    /// The isolated environment cannot be created on this system.
    #[error("isolated environment cannot be created: {remedy}")]
    EnvironmentUnavailable {
        /// What the user has to do to fix it.
        remedy: String,
    },

    /// A command exited with a non-zero status.
    #[error("`{command}` failed with exit code {code:?}: {output}")]
    CommandFailed {
        /// The command that failed (secrets redacted).
        command: String,
        /// The exit code, if any.
        code: Option<i32>,
        /// Captured output.
        output: String,
    },

    /// Command output did not have the expected shape.
    #[error("unexpected output from `{command}`: {message}")]
    UnexpectedOutput {
        /// The command whose output was unexpected.
        command: String,
        /// Description of the problem.
        message: String,
    },

    /// Querying the package index failed.
    #[error("package index request failed: {0}")]
    PackageIndex(#[from] reqwest::Error),

    /// Creating the environment directory or writing the manifest failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A checker subprocess could not be run.
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl EnvironmentError {
    /// Returns true if the error needs user action and must block startup.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedInterpreter { .. }
                | Self::UnknownInterpreter(_)
                | Self::EnvironmentUnavailable { .. }
        )
    }
}

/// Errors related to device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device rejected or failed a command.
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// An error delivered by the device event stream.
///
/// The stream reconnects on its own; receiving one only marks the device
/// offline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("device event stream error: {0}")]
pub struct StreamError(pub String);

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
