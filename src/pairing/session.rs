// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State of a single pairing attempt.

use std::time::Duration;

use uuid::Uuid;

use super::output::{PairingOutput, classify};
use crate::credentials::Credentials;

/// How a pairing attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Pairing succeeded.
    Paired(Credentials),
    /// The device asked us to wait before the next attempt.
    BackOff(Duration),
    /// The attempt failed; retry immediately.
    Retry,
}

/// One pairing attempt against one device.
///
/// A fresh session is created for every attempt and never shared between
/// devices or attempts.
#[derive(Debug)]
pub struct PairingSession {
    id: Uuid,
    host: String,
    port: u16,
    pin_prompt_seen: bool,
    backoff: Option<Duration>,
    credentials: Option<Credentials>,
    go_ahead: bool,
    process_exited: bool,
}

impl PairingSession {
    /// Creates a session for `host` with its PIN endpoint on `port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            port,
            pin_prompt_seen: false,
            backoff: None,
            credentials: None,
            go_ahead: false,
            process_exited: false,
        }
    }

    /// Returns the session id used in log messages.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the device host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the PIN endpoint port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns true once the PIN prompt was printed.
    #[must_use]
    pub fn pin_prompt_seen(&self) -> bool {
        self.pin_prompt_seen
    }

    /// Returns true once pairing succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.credentials.is_some()
    }

    /// Returns true once the pairing subprocess has exited.
    #[must_use]
    pub fn process_exited(&self) -> bool {
        self.process_exited
    }

    /// Feeds one output line into the session.
    pub fn observe(&mut self, line: &str) -> PairingOutput {
        let output = classify(line);
        match &output {
            PairingOutput::PinPrompt => self.pin_prompt_seen = true,
            PairingOutput::BackOff(wait) => self.backoff = Some(*wait),
            PairingOutput::Success(credentials) => self.credentials = Some(credentials.clone()),
            PairingOutput::Error | PairingOutput::Other => {}
        }
        self.go_ahead |= output.is_marker();
        output
    }

    /// Records that the subprocess has exited.
    pub fn mark_exited(&mut self) {
        self.process_exited = true;
    }

    /// Returns true when a marker was seen and the subprocess has exited.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.go_ahead && self.process_exited
    }

    /// Consumes the session and reports its outcome.
    #[must_use]
    pub fn into_outcome(self) -> AttemptOutcome {
        match (self.credentials, self.backoff) {
            (Some(credentials), _) => AttemptOutcome::Paired(credentials),
            (None, Some(wait)) => AttemptOutcome::BackOff(wait),
            (None, None) => AttemptOutcome::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_needs_marker_and_exit() {
        let mut session = PairingSession::new("10.0.0.20", 42020);
        session.observe("Scanning...");
        session.mark_exited();
        assert!(!session.is_complete());

        session.observe("Enter PIN on screen: ");
        assert!(session.pin_prompt_seen());
        assert!(session.is_complete());
    }

    #[test]
    fn success_outcome() {
        let mut session = PairingSession::new("10.0.0.20", 42020);
        session.observe("Enter PIN on screen: ");
        session.observe("You may now use these credentials: abc");
        session.mark_exited();

        assert!(session.succeeded());
        assert_eq!(
            session.into_outcome(),
            AttemptOutcome::Paired(Credentials::new("abc"))
        );
    }

    #[test]
    fn backoff_outcome() {
        let mut session = PairingSession::new("10.0.0.20", 42020);
        session.observe("BackOff=12s");
        session.mark_exited();

        assert_eq!(
            session.into_outcome(),
            AttemptOutcome::BackOff(Duration::from_secs(17))
        );
    }

    #[test]
    fn error_outcome_retries() {
        let mut session = PairingSession::new("10.0.0.20", 42020);
        session.observe("error: connection reset");
        session.mark_exited();
        assert_eq!(session.into_outcome(), AttemptOutcome::Retry);
    }

    #[test]
    fn plain_output_does_not_complete_attempt() {
        let mut session = PairingSession::new("10.0.0.20", 42020);
        session.observe("Scanning for devices...");
        session.mark_exited();
        assert!(!session.is_complete());

        session.observe("Pairing ERROR: timed out");
        assert!(session.is_complete());
    }

    #[test]
    fn sessions_have_distinct_ids() {
        let a = PairingSession::new("10.0.0.20", 42020);
        let b = PairingSession::new("10.0.0.20", 42020);
        assert_ne!(a.id(), b.id());
    }
}
