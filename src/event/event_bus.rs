// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting bridge events.

use tokio::sync::broadcast;

use super::BridgeEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`BridgeEvent`]s to any number of subscribers.
///
/// A subscriber that falls more than the capacity behind loses the oldest
/// events and sees `RecvError::Lagged`. Clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event; it is discarded when nobody is subscribed.
    pub fn publish(&self, event: BridgeEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceId;

    fn device() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap()
    }

    #[test]
    fn subscriber_count_follows_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_every_subscriber() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(BridgeEvent::Paired { device: device() });

        assert_eq!(rx1.recv().await.unwrap(), BridgeEvent::Paired { device: device() });
        assert_eq!(rx2.recv().await.unwrap().device(), &device());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::with_capacity(4).publish(BridgeEvent::DeviceAdded { device: device() });
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let _rx = bus.subscribe();
        assert_eq!(clone.subscriber_count(), 1);
    }
}
