// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the bridge and device lifecycle.
//!
//! The remote-control tool is a shell script that appends every command
//! line it receives to a log file, answers the state query, and records app
//! launches next to the log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use atv_bridge::connectivity::{Accessory, PowerOnOutcome};
use atv_bridge::credentials::{CredentialStore, Credentials};
use atv_bridge::error::{Error, PairingError};
use atv_bridge::event::BridgeEvent;
use atv_bridge::manager::{Bridge, BridgeConfig};
use atv_bridge::pairing::Pairer;
use atv_bridge::process::ProcessSpec;
use atv_bridge::types::{DeviceId, DeviceIdentity, MediaType, PlaybackState, PowerState, RemoteCommand};
use parking_lot::Mutex;
use tokio::sync::broadcast;

const REMOTE_TOOL: &str = r#"
case "$*" in
    *launch_app=*) echo "$*" > "$0.launch" ;;
    *playing*) printf 'Media type: Video\nDevice state: Playing\n' ;;
    *) while read line; do echo "$line" >> "$0"; done ;;
esac
"#;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Returns fixed credentials and counts how often it was asked.
#[derive(Default)]
struct FakePairer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Pairer for FakePairer {
    async fn pair(&self, host: &str, _display_name: &str) -> Result<Credentials, PairingError> {
        assert_eq!(host, "192.168.1.23");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Credentials::new("paired-secret:42"))
    }
}

#[derive(Default)]
struct RecordingAccessory {
    active: AtomicBool,
    indicators: Mutex<Vec<String>>,
}

impl Accessory for RecordingAccessory {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_active(&self, power: PowerState) {
        self.active.store(power.is_on(), Ordering::SeqCst);
    }

    fn set_device_state_indicator(&self, state: PlaybackState, on: bool) {
        self.indicators.lock().push(format!("{state}={on}"));
    }

    fn set_media_type_indicator(&self, media: MediaType, on: bool) {
        self.indicators.lock().push(format!("{media}={on}"));
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    storage: PathBuf,
    log: PathBuf,
    bridge: Bridge,
    pair_calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self::with_remote(|log| {
            ProcessSpec::new("sh")
                .arg("-c")
                .arg(REMOTE_TOOL)
                .arg(log.display().to_string())
        })
    }

    fn with_remote(remote: impl FnOnce(&Path) -> ProcessSpec) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().to_path_buf();
        let log = dir.path().join("commands.log");

        let pairer = FakePairer::default();
        let pair_calls = Arc::clone(&pairer.calls);
        let bridge = Bridge::new(BridgeConfig::new(&storage))
            .with_pairer(pairer)
            .with_remote_spec(remote(&log));

        Self {
            _dir: dir,
            storage,
            log,
            bridge,
            pair_calls,
        }
    }

    fn logged(&self) -> String {
        std::fs::read_to_string(&self.log).unwrap_or_default()
    }
}

fn device_id() -> DeviceId {
    DeviceId::new("AA:BB:CC:DD:EE:FF").unwrap()
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new(device_id(), "192.168.1.23", "Living Room").with_model("AppleTV11,1")
}

async fn next_event(events: &mut broadcast::Receiver<BridgeEvent>) -> BridgeEvent {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .expect("event should arrive")
        .unwrap()
}

/// Waits for `event`, skipping everything else.
async fn wait_for(events: &mut broadcast::Receiver<BridgeEvent>, event: &BridgeEvent) {
    loop {
        if &next_event(events).await == event {
            return;
        }
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn unpaired_device_is_paired_before_channel_opens() {
    let harness = Harness::new();
    let mut events = harness.bridge.subscribe();

    harness.bridge.add_device(identity()).await.unwrap();
    assert_eq!(harness.pair_calls.load(Ordering::SeqCst), 1);

    let lifecycle: Vec<BridgeEvent> = {
        let mut seen = Vec::new();
        while seen.len() < 3 {
            let event = next_event(&mut events).await;
            if !matches!(event, BridgeEvent::DeviceAdded { .. }) {
                seen.push(event);
            }
        }
        seen
    };
    assert_eq!(
        lifecycle,
        vec![
            BridgeEvent::PairingStarted { device: device_id() },
            BridgeEvent::Paired { device: device_id() },
            BridgeEvent::ChannelOpened { device: device_id() },
        ]
    );

    let stored = std::fs::read_to_string(
        harness
            .storage
            .join("atv-bridge")
            .join("AABBCCDDEEFF")
            .join("credentials.txt"),
    )
    .unwrap();
    assert_eq!(stored, "paired-secret:42");
}

#[tokio::test]
async fn stored_credentials_skip_pairing() {
    let harness = Harness::new();
    CredentialStore::new(&harness.storage)
        .save(&device_id(), &Credentials::new("stored-secret"))
        .await
        .unwrap();
    let mut events = harness.bridge.subscribe();

    harness.bridge.add_device(identity()).await.unwrap();
    assert_eq!(harness.pair_calls.load(Ordering::SeqCst), 0);

    let first_device_event = loop {
        let event = next_event(&mut events).await;
        if !matches!(event, BridgeEvent::DeviceAdded { .. }) {
            break event;
        }
    };
    assert_eq!(first_device_event, BridgeEvent::ChannelOpened { device: device_id() });
}

#[tokio::test]
async fn commands_reach_the_control_process() {
    let harness = Harness::new();
    let mut events = harness.bridge.subscribe();
    let device = harness.bridge.add_device(identity()).await.unwrap();
    wait_for(&mut events, &BridgeEvent::ChannelOpened { device: device_id() }).await;
    assert!(device.is_connected());

    harness
        .bridge
        .send(&device_id(), RemoteCommand::Select)
        .await
        .unwrap();
    device.send(RemoteCommand::PlayPause).await.unwrap();

    eventually(|| harness.logged() == "select\nplay_pause\n").await;
}

#[tokio::test]
async fn exited_channel_is_reopened() {
    let harness = Harness::with_remote(|_| ProcessSpec::new("sh").arg("-c").arg("exit 3").arg("sh"));
    let mut events = harness.bridge.subscribe();
    harness.bridge.add_device(identity()).await.unwrap();

    wait_for(&mut events, &BridgeEvent::ChannelOpened { device: device_id() }).await;
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::ConnectionLost {
            device: device_id(),
            exit_code: Some(3),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        BridgeEvent::ChannelOpened { device: device_id() }
    );
}

#[tokio::test]
async fn power_on_through_monitor_uses_shared_window() {
    let harness = Harness::new();
    let mut events = harness.bridge.subscribe();
    let device = harness.bridge.add_device(identity()).await.unwrap();
    wait_for(&mut events, &BridgeEvent::ChannelOpened { device: device_id() }).await;

    let accessory = Arc::new(RecordingAccessory::default());
    let monitor = device.monitor(Arc::clone(&accessory) as Arc<dyn Accessory>);
    assert!(Arc::ptr_eq(monitor.window(), device.power_window()));

    assert_eq!(monitor.power_on().await.unwrap(), PowerOnOutcome::Ready);
    assert!(device.power_window().within_grace());
    assert!(!device.power_window().is_turning_on());
    assert_eq!(
        *accessory.indicators.lock(),
        vec!["playing=true".to_string(), "video=true".to_string()]
    );
    eventually(|| harness.logged().contains("turn_on\n")).await;
}

#[tokio::test]
async fn app_launch_is_fire_and_forget() {
    let harness = Harness::new();
    let device = harness.bridge.add_device(identity()).await.unwrap();

    device.launch_app("   ");
    device.launch_app("com.netflix.Netflix");

    let launch_log = harness.log.with_extension("log.launch");
    eventually(|| {
        std::fs::read_to_string(&launch_log)
            .is_ok_and(|line| line.trim_end().ends_with("launch_app=com.netflix.Netflix"))
    })
    .await;
    let recorded = std::fs::read_to_string(&launch_log).unwrap();
    assert!(recorded.contains("--id AA:BB:CC:DD:EE:FF"));
}

#[tokio::test]
async fn registry_tracks_devices() {
    let harness = Harness::new();
    let mut events = harness.bridge.subscribe();

    let first = harness.bridge.add_device(identity()).await.unwrap();
    let again = harness.bridge.add_device(identity()).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(harness.bridge.device_count().await, 1);
    assert_eq!(harness.bridge.device_ids().await, vec![device_id()]);
    assert_eq!(first.identity().model.as_deref(), Some("AppleTV11,1"));
    drop((first, again));

    assert!(harness.bridge.remove_device(&device_id()).await);
    assert!(!harness.bridge.remove_device(&device_id()).await);
    assert_eq!(harness.bridge.device_count().await, 0);
    wait_for(&mut events, &BridgeEvent::DeviceRemoved { device: device_id() }).await;

    let result = harness.bridge.send(&device_id(), RemoteCommand::Menu).await;
    assert!(matches!(result, Err(Error::DeviceNotFound)));
}
