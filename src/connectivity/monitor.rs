// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event filtering, offline tracking, and the power command paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::accessory::{Accessory, DeviceControl, DeviceSnapshot};
use super::power_window::PowerOnWindow;
use super::stream::{StreamMessage, Update};
use crate::error::{DeviceError, StreamError};
use crate::event::{BridgeEvent, EventBus};
use crate::types::{DeviceId, MediaType, PlaybackState, PowerState};

/// Interval between state queries while waiting for a woken device.
pub const POWER_ON_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Ceiling on the wait for a woken device to report its state.
pub const POWER_ON_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a power-off command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommandOutcome {
    /// The command was sent to the device.
    Forwarded,
    /// The command came too soon after a power-on and was dropped.
    Suppressed,
}

/// Result of a power-on command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOnOutcome {
    /// The device reported both its playback state and media type.
    Ready,
    /// The device did not report both within [`POWER_ON_TIMEOUT`].
    TimedOut,
}

/// Applies a device's event stream to its accessory.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use atv_bridge::connectivity::{Accessory, ConnectivityMonitor, DeviceControl};
/// use atv_bridge::types::DeviceId;
///
/// # fn example(accessory: Arc<dyn Accessory>, control: Arc<dyn DeviceControl>) {
/// let device = DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap();
/// let monitor = Arc::new(ConnectivityMonitor::new(device, accessory, control));
///
/// let (tx, rx) = tokio::sync::mpsc::channel(64);
/// tokio::spawn({
///     let monitor = Arc::clone(&monitor);
///     async move { monitor.run(rx).await }
/// });
/// // feed `tx` from the device event stream
/// # drop(tx);
/// # }
/// ```
pub struct ConnectivityMonitor {
    device: DeviceId,
    accessory: Arc<dyn Accessory>,
    control: Arc<dyn DeviceControl>,
    window: Arc<PowerOnWindow>,
    offline: AtomicBool,
    events: Option<EventBus>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("device", &self.device)
            .field("window", &self.window)
            .field("offline", &self.is_offline())
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    /// Creates a monitor with its own power-on window.
    #[must_use]
    pub fn new(device: DeviceId, accessory: Arc<dyn Accessory>, control: Arc<dyn DeviceControl>) -> Self {
        Self {
            device,
            accessory,
            control,
            window: Arc::new(PowerOnWindow::new()),
            offline: AtomicBool::new(false),
            events: None,
        }
    }

    /// Shares `window` with another component of the same device.
    #[must_use]
    pub fn with_window(mut self, window: Arc<PowerOnWindow>) -> Self {
        self.window = window;
        self
    }

    /// Publishes [`BridgeEvent::OfflineChanged`] on `events`.
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Returns the device this monitor follows.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Returns the power-on window.
    #[must_use]
    pub fn window(&self) -> &Arc<PowerOnWindow> {
        &self.window
    }

    /// Returns true if the event stream reported an error and has not
    /// delivered a value since.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Handles messages from `messages` until the sender is dropped.
    pub async fn run(&self, mut messages: mpsc::Receiver<StreamMessage>) {
        while let Some(message) = messages.recv().await {
            self.handle(message);
        }
        tracing::debug!(device = %self.device, "event stream closed");
    }

    /// Dispatches one stream message.
    pub fn handle(&self, message: StreamMessage) {
        match message {
            StreamMessage::Power(update) => self.handle_power(update),
            StreamMessage::DeviceState(update) => self.handle_device_state(update),
            StreamMessage::MediaType(update) => self.handle_media_type(update),
            StreamMessage::ConnectionError(error) => self.handle_connection_error(&error),
        }
    }

    /// Marks the device offline.
    ///
    /// The stream reconnects by itself; nothing is retried here.
    pub fn handle_connection_error(&self, error: &StreamError) {
        if self.offline.swap(true, Ordering::AcqRel) {
            tracing::debug!(device = %self.device, %error, "event stream still offline");
        } else {
            tracing::warn!(device = %self.device, %error, "lost connection, trying to reconnect");
            self.publish_offline(true);
        }
    }

    /// Applies a power state event.
    ///
    /// Null and unchanged values are ignored. An off value within the grace
    /// window after a power-on command is suppressed.
    pub fn handle_power(&self, update: Result<Update<PowerState>, StreamError>) {
        let Some(update) = self.accept("power state", update) else {
            return;
        };
        let Some(power) = update.value else {
            return;
        };
        if update.is_unchanged() {
            return;
        }
        if power == PowerState::Off && self.window.within_grace() {
            tracing::debug!(device = %self.device, "suppressing power-off event after power-on");
            return;
        }

        tracing::debug!(device = %self.device, %power, "power state changed");
        self.accessory.set_active(power);
    }

    /// Moves the playback state indicator from the old value to the new one.
    pub fn handle_device_state(&self, update: Result<Update<PlaybackState>, StreamError>) {
        if let Some(update) = self.accept("device state", update) {
            self.toggle_indicators(update, |accessory, state, on| {
                accessory.set_device_state_indicator(state, on);
            });
        }
    }

    /// Moves the media type indicator from the old value to the new one.
    pub fn handle_media_type(&self, update: Result<Update<MediaType>, StreamError>) {
        if let Some(update) = self.accept("media type", update) {
            self.toggle_indicators(update, |accessory, media, on| {
                accessory.set_media_type_indicator(media, on);
            });
        }
    }

    /// Wakes the device and waits for it to report its state.
    ///
    /// The power-on is recorded in the window before the command is sent.
    /// State is polled every [`POWER_ON_POLL_INTERVAL`] until both playback
    /// state and media type are known or [`POWER_ON_TIMEOUT`] passes; the
    /// first value seen of each is applied right away. The turning-on flag is
    /// cleared on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the on-command itself fails.
    pub async fn power_on(&self) -> Result<PowerOnOutcome, DeviceError> {
        let _turning_on = self.window.begin_power_on();
        tracing::info!(device = %self.device, "turning on");
        self.control.turn_on().await?;

        let deadline = Instant::now() + POWER_ON_TIMEOUT;
        let mut seen = DeviceSnapshot::default();

        loop {
            match self.control.state().await {
                Ok(snapshot) => {
                    if seen.device_state.is_none()
                        && let Some(state) = snapshot.device_state
                    {
                        self.accessory.set_device_state_indicator(state, true);
                        seen.device_state = Some(state);
                    }
                    if seen.media_type.is_none()
                        && let Some(media) = snapshot.media_type
                    {
                        self.accessory.set_media_type_indicator(media, true);
                        seen.media_type = Some(media);
                    }
                    if seen.device_state.is_some() && seen.media_type.is_some() {
                        tracing::debug!(device = %self.device, "device reported state after power-on");
                        return Ok(PowerOnOutcome::Ready);
                    }
                }
                Err(e) => tracing::debug!(device = %self.device, error = %e, "state query failed"),
            }

            if Instant::now() >= deadline {
                tracing::info!(device = %self.device, "device did not report state after power-on");
                return Ok(PowerOnOutcome::TimedOut);
            }
            tokio::time::sleep(POWER_ON_POLL_INTERVAL).await;
        }
    }

    /// Puts the device in standby unless a power-on was issued within the
    /// grace window.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the forwarded off-command fails.
    pub async fn power_off(&self) -> Result<PowerCommandOutcome, DeviceError> {
        if self.window.within_grace() {
            tracing::info!(device = %self.device, "ignoring power-off right after power-on");
            return Ok(PowerCommandOutcome::Suppressed);
        }
        tracing::info!(device = %self.device, "turning off");
        self.control.turn_off().await?;
        Ok(PowerCommandOutcome::Forwarded)
    }

    /// Drops error-shaped events and clears `offline` on a non-null value.
    fn accept<T>(&self, category: &str, update: Result<Update<T>, StreamError>) -> Option<Update<T>> {
        match update {
            Ok(update) => {
                if update.value.is_some() && self.offline.swap(false, Ordering::AcqRel) {
                    tracing::info!(device = %self.device, "connection re-established");
                    self.publish_offline(false);
                }
                Some(update)
            }
            Err(error) => {
                tracing::debug!(device = %self.device, category, %error, "dropping stream error");
                None
            }
        }
    }

    /// Shared by playback state and media type: unchanged values and an
    /// inactive accessory leave the indicators alone.
    fn toggle_indicators<T, F>(&self, update: Update<T>, set: F)
    where
        T: Copy + PartialEq,
        F: Fn(&dyn Accessory, T, bool),
    {
        if update.is_unchanged() || !self.accessory.is_active() {
            return;
        }
        if let Some(old) = update.old_value {
            set(self.accessory.as_ref(), old, false);
        }
        if let Some(new) = update.value {
            set(self.accessory.as_ref(), new, true);
        }
    }

    fn publish_offline(&self, offline: bool) {
        if let Some(events) = &self.events {
            events.publish(BridgeEvent::OfflineChanged {
                device: self.device.clone(),
                offline,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::connectivity::GRACE_WINDOW;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Active(PowerState),
        State(PlaybackState, bool),
        Media(MediaType, bool),
    }

    #[derive(Default)]
    struct FakeAccessory {
        active: AtomicBool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeAccessory {
        fn active() -> Arc<Self> {
            let accessory = Self::default();
            accessory.active.store(true, Ordering::SeqCst);
            Arc::new(accessory)
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    impl Accessory for FakeAccessory {
        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn set_active(&self, power: PowerState) {
            self.active.store(power.is_on(), Ordering::SeqCst);
            self.calls.lock().push(Call::Active(power));
        }

        fn set_device_state_indicator(&self, state: PlaybackState, on: bool) {
            self.calls.lock().push(Call::State(state, on));
        }

        fn set_media_type_indicator(&self, media: MediaType, on: bool) {
            self.calls.lock().push(Call::Media(media, on));
        }
    }

    /// Reports its state only from the `ready_after`-th query on.
    #[derive(Default)]
    struct FakeControl {
        ready_after: Option<usize>,
        queries: AtomicUsize,
        on: AtomicUsize,
        off: AtomicUsize,
    }

    impl FakeControl {
        fn ready_after(queries: usize) -> Arc<Self> {
            Arc::new(Self {
                ready_after: Some(queries),
                ..Self::default()
            })
        }

        fn never_ready() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    #[async_trait]
    impl DeviceControl for FakeControl {
        async fn turn_on(&self) -> Result<(), DeviceError> {
            self.on.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn turn_off(&self) -> Result<(), DeviceError> {
            self.off.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn state(&self) -> Result<DeviceSnapshot, DeviceError> {
            let query = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            match self.ready_after {
                Some(n) if query >= n => Ok(DeviceSnapshot {
                    device_state: Some(PlaybackState::Idle),
                    media_type: Some(MediaType::Unknown),
                }),
                _ => Ok(DeviceSnapshot::default()),
            }
        }
    }

    fn device() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap()
    }

    fn monitor(accessory: &Arc<FakeAccessory>, control: &Arc<FakeControl>) -> ConnectivityMonitor {
        ConnectivityMonitor::new(device(), accessory.clone(), control.clone())
    }

    fn power(value: Option<PowerState>, old: Option<PowerState>) -> StreamMessage {
        StreamMessage::Power(Ok(Update::new(value, old)))
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_command_suppressed_inside_grace_window() {
        let accessory = FakeAccessory::active();
        let control = FakeControl::ready_after(1);
        let monitor = monitor(&accessory, &control);

        assert_eq!(monitor.power_on().await.unwrap(), PowerOnOutcome::Ready);
        assert_eq!(monitor.power_off().await.unwrap(), PowerCommandOutcome::Suppressed);

        tokio::time::advance(GRACE_WINDOW - Duration::from_millis(1)).await;
        assert_eq!(monitor.power_off().await.unwrap(), PowerCommandOutcome::Suppressed);
        assert_eq!(control.off.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(monitor.power_off().await.unwrap(), PowerCommandOutcome::Forwarded);
        assert_eq!(control.off.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_without_prior_power_on_is_forwarded() {
        let accessory = FakeAccessory::active();
        let control = FakeControl::never_ready();
        let monitor = monitor(&accessory, &control);

        assert_eq!(monitor.power_off().await.unwrap(), PowerCommandOutcome::Forwarded);
        assert_eq!(control.off.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_event_inside_grace_window_keeps_active() {
        let accessory = FakeAccessory::active();
        let control = FakeControl::ready_after(1);
        let monitor = monitor(&accessory, &control);
        monitor.power_on().await.unwrap();
        let before = accessory.calls();

        tokio::time::advance(Duration::from_secs(7)).await;
        monitor.handle(power(Some(PowerState::Off), Some(PowerState::On)));
        assert!(accessory.is_active());
        assert_eq!(accessory.calls(), before);

        tokio::time::advance(Duration::from_millis(500)).await;
        monitor.handle(power(Some(PowerState::Off), Some(PowerState::On)));
        assert!(!accessory.is_active());
        assert_eq!(accessory.calls().last(), Some(&Call::Active(PowerState::Off)));
    }

    #[test]
    fn null_and_unchanged_power_events_are_ignored() {
        let accessory = FakeAccessory::active();
        let monitor = monitor(&accessory, &FakeControl::never_ready());

        monitor.handle(power(None, Some(PowerState::On)));
        monitor.handle(power(Some(PowerState::On), Some(PowerState::On)));
        assert!(accessory.calls().is_empty());

        monitor.handle(power(Some(PowerState::Off), Some(PowerState::On)));
        assert_eq!(accessory.calls(), vec![Call::Active(PowerState::Off)]);
    }

    #[test]
    fn device_state_moves_indicator() {
        let accessory = FakeAccessory::active();
        let monitor = monitor(&accessory, &FakeControl::never_ready());

        monitor.handle(StreamMessage::DeviceState(Ok(Update::new(
            Some(PlaybackState::Playing),
            Some(PlaybackState::Paused),
        ))));
        assert_eq!(
            accessory.calls(),
            vec![
                Call::State(PlaybackState::Paused, false),
                Call::State(PlaybackState::Playing, true),
            ]
        );
    }

    #[test]
    fn duplicate_state_event_is_a_no_op() {
        let accessory = FakeAccessory::active();
        let monitor = monitor(&accessory, &FakeControl::never_ready());
        let first = Update::new(Some(PlaybackState::Playing), Some(PlaybackState::Paused));
        let repeat = Update::new(Some(PlaybackState::Playing), Some(PlaybackState::Playing));

        monitor.handle(StreamMessage::DeviceState(Ok(first)));
        let after_first = accessory.calls();
        monitor.handle(StreamMessage::DeviceState(Ok(repeat)));
        assert_eq!(accessory.calls(), after_first);
    }

    #[test]
    fn indicators_skipped_while_inactive() {
        let accessory = Arc::new(FakeAccessory::default());
        let monitor = monitor(&accessory, &FakeControl::never_ready());

        monitor.handle(StreamMessage::DeviceState(Ok(Update::new(
            Some(PlaybackState::Playing),
            None,
        ))));
        monitor.handle(StreamMessage::MediaType(Ok(Update::new(
            Some(MediaType::Video),
            Some(MediaType::Music),
        ))));
        assert!(accessory.calls().is_empty());
    }

    #[test]
    fn media_type_follows_same_rules() {
        let accessory = FakeAccessory::active();
        let monitor = monitor(&accessory, &FakeControl::never_ready());

        monitor.handle(StreamMessage::MediaType(Ok(Update::new(Some(MediaType::Tv), None))));
        monitor.handle(StreamMessage::MediaType(Ok(Update::new(
            Some(MediaType::Tv),
            Some(MediaType::Tv),
        ))));
        assert_eq!(accessory.calls(), vec![Call::Media(MediaType::Tv, true)]);
    }

    #[tokio::test]
    async fn offline_set_by_error_and_cleared_by_value() {
        let accessory = FakeAccessory::active();
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let monitor = monitor(&accessory, &FakeControl::never_ready()).with_event_bus(bus);

        monitor.handle(StreamMessage::ConnectionError(StreamError("reset".into())));
        monitor.handle(StreamMessage::ConnectionError(StreamError("reset".into())));
        assert!(monitor.is_offline());

        // errors on category channels are dropped and do not clear offline
        monitor.handle(StreamMessage::Power(Err(StreamError("bad".into()))));
        monitor.handle(power(None, None));
        assert!(monitor.is_offline());

        monitor.handle(power(Some(PowerState::On), Some(PowerState::On)));
        assert!(!monitor.is_offline());

        let offline = BridgeEvent::OfflineChanged { device: device(), offline: true };
        let online = BridgeEvent::OfflineChanged { device: device(), offline: false };
        assert_eq!(events.recv().await.unwrap(), offline);
        assert_eq!(events.recv().await.unwrap(), online);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_polls_until_state_known() {
        let accessory = FakeAccessory::active();
        let control = FakeControl::ready_after(4);
        let monitor = monitor(&accessory, &control);

        let start = Instant::now();
        assert_eq!(monitor.power_on().await.unwrap(), PowerOnOutcome::Ready);
        assert!(start.elapsed() >= POWER_ON_POLL_INTERVAL * 3);
        assert!(start.elapsed() < POWER_ON_POLL_INTERVAL * 4);
        assert_eq!(control.on.load(Ordering::SeqCst), 1);
        assert!(!monitor.window().is_turning_on());
        assert_eq!(
            accessory.calls(),
            vec![
                Call::State(PlaybackState::Idle, true),
                Call::Media(MediaType::Unknown, true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_gives_up_after_ceiling() {
        let accessory = FakeAccessory::active();
        let control = FakeControl::never_ready();
        let monitor = Arc::new(monitor(&accessory, &control));

        let task = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.power_on().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(monitor.window().is_turning_on());

        let start = Instant::now();
        assert_eq!(task.await.unwrap().unwrap(), PowerOnOutcome::TimedOut);
        assert!(start.elapsed() <= POWER_ON_TIMEOUT);
        assert!(!monitor.window().is_turning_on());
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let accessory = FakeAccessory::active();
        let monitor = monitor(&accessory, &FakeControl::never_ready());
        let (tx, rx) = mpsc::channel(8);

        tx.send(power(Some(PowerState::Off), Some(PowerState::On))).await.unwrap();
        tx.send(StreamMessage::ConnectionError(StreamError("gone".into()))).await.unwrap();
        drop(tx);

        monitor.run(rx).await;
        assert!(monitor.is_offline());
        assert_eq!(accessory.calls(), vec![Call::Active(PowerState::Off)]);
    }
}
