// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for the full command flow, with fake network tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::timeout;

use raspible::bluetooth::ble_constants::{interfaces, paths};
use raspible::bluetooth::protocol::Credential;
use raspible::bluetooth::registration::{
    log_outcomes, spawn_registration, RegistrationKind, RegistrationOutcome,
};
use raspible::bluetooth::{ChangeNotification, GattApplication, PropertyValue, SubscriptionState};
use raspible::commands::CommandProtocol;
use raspible::events::{EventProcessor, HostHandle, COMMAND_QUEUE_CAPACITY};
use raspible::wifi::{NetworkConnectTool, NetworkRecord, NetworkScanTool, ToolError};

const COMMAND: &str = "/org/bluez/raspible/service0/char0";
const RESULT: &str = "/org/bluez/raspible/service0/char_notify1";
const WAIT: Duration = Duration::from_secs(2);

const SCAN_OUTPUT: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: aa:bb:cc:dd:ee:01
                    ESSID:"Home"
          Cell 02 - Address: aa:bb:cc:dd:ee:02
                    ESSID:"Office"
          Cell 03 - Address: aa:bb:cc:dd:ee:03
                    ESSID:"Home"
          Cell 04 - Address: aa:bb:cc:dd:ee:04
                    ESSID:""
"#;

const HIDDEN_ONLY_OUTPUT: &str = r#"wlan0     Scan completed :
          Cell 01 - Address: aa:bb:cc:dd:ee:01
                    ESSID:""
          Cell 02 - Address: aa:bb:cc:dd:ee:02
                    ESSID:""
"#;

#[derive(Default)]
struct FakeTools {
    calls: Mutex<Vec<String>>,
    scan_hangs: bool,
    scan_fails: bool,
    scan_output: Option<&'static str>,
    /// Each scan waits for one permit when set.
    scan_gate: Option<Arc<Semaphore>>,
    connect_fails: bool,
}

impl FakeTools {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NetworkScanTool for FakeTools {
    async fn scan(&self) -> Result<String, ToolError> {
        self.calls.lock().push("scan".into());
        if self.scan_hangs {
            futures::future::pending::<()>().await;
        }
        if let Some(gate) = &self.scan_gate {
            let _permit = gate.acquire().await;
        }
        if self.scan_fails {
            return Err(ToolError::Failed {
                command: "iwlist wlan0".into(),
                status: "exit status: 255".into(),
                stderr: "wlan0     Interface doesn't support scanning.".into(),
            });
        }
        Ok(self.scan_output.unwrap_or(SCAN_OUTPUT).to_string())
    }

    async fn list_network_names(&self) -> Result<String, ToolError> {
        self.calls.lock().push("list".into());
        Ok("ESSID:\"Home\"\nESSID:\"Office\"\n".to_string())
    }
}

#[async_trait]
impl NetworkConnectTool for FakeTools {
    async fn connect(&self, credential: &Credential) -> Result<String, ToolError> {
        self.calls
            .lock()
            .push(format!("connect {}", credential.ssid));
        if self.connect_fails {
            return Err(ToolError::Failed {
                command: "nmcli device".into(),
                status: "exit status: 4".into(),
                stderr: "Secrets were required, but not provided".into(),
            });
        }
        Ok("Device 'wlan0' successfully activated".to_string())
    }
}

struct Harness {
    host: HostHandle,
    changes: mpsc::UnboundedReceiver<ChangeNotification>,
    tools: Arc<FakeTools>,
}

impl Harness {
    fn start(tools: FakeTools) -> Self {
        let tools = Arc::new(tools);
        let protocol = CommandProtocol::new(tools.clone(), tools.clone());
        let (changes_tx, changes) = mpsc::unbounded_channel();
        let (processor, host) = EventProcessor::new(
            GattApplication::provisioning(paths::DEFAULT_ROOT),
            protocol,
            changes_tx,
        );
        tokio::spawn(processor.run());
        Self {
            host,
            changes,
            tools,
        }
    }

    async fn next_value(&mut self) -> Vec<u8> {
        let change = timeout(WAIT, self.changes.recv())
            .await
            .expect("timed out waiting for a notification")
            .expect("change channel closed");
        assert_eq!(change.path, RESULT);
        assert_eq!(change.interface, interfaces::GATT_CHARACTERISTIC);
        assert!(change.invalidated.is_empty());
        change.value().unwrap().to_vec()
    }

    async fn next_text(&mut self) -> String {
        String::from_utf8(self.next_value().await).unwrap()
    }

    async fn assert_quiet(&mut self) {
        assert!(timeout(Duration::from_millis(200), self.changes.recv())
            .await
            .is_err());
    }
}

#[tokio::test]
async fn test_scan_wifi_notifies_deduplicated_networks() {
    let mut h = Harness::start(FakeTools::default());
    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;

    let networks: Vec<NetworkRecord> = serde_json::from_slice(&h.next_value().await).unwrap();
    assert_eq!(
        networks,
        vec![
            NetworkRecord {
                address: "AA:BB:CC:DD:EE:01".into(),
                essid: "Home".into(),
            },
            NetworkRecord {
                address: "AA:BB:CC:DD:EE:02".into(),
                essid: "Office".into(),
            },
        ]
    );
    assert_eq!(h.tools.calls(), vec!["scan"]);
}

#[tokio::test]
async fn test_credential_success_sends_status_then_marker() {
    let mut h = Harness::start(FakeTools::default());
    h.host.start_notify(RESULT).await;
    h.host
        .write_value(COMMAND, br#"{"ssid":"Home","password":"hunter22"}"#.to_vec())
        .await;

    assert_eq!(h.next_text().await, "ESSID:\"Home\"\nESSID:\"Office\"");
    assert_eq!(h.next_text().await, "✅ Connected to Wi-Fi");
    assert_eq!(h.tools.calls(), vec!["list", "connect Home"]);

    // Exactly two notifications for one credential command.
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_credential_failure_sends_failure_marker() {
    let mut h = Harness::start(FakeTools {
        connect_fails: true,
        ..Default::default()
    });
    h.host.start_notify(RESULT).await;
    h.host
        .write_value(COMMAND, br#"{"ssid":"Home","password":"wrong"}"#.to_vec())
        .await;

    let _status = h.next_text().await;
    assert_eq!(h.next_text().await, "❌ Failed to connect");
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_scan_failure_notifies_nothing() {
    let mut h = Harness::start(FakeTools {
        scan_fails: true,
        ..Default::default()
    });
    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;

    h.assert_quiet().await;
    assert_eq!(h.tools.calls(), vec!["scan"]);
}

#[tokio::test]
async fn test_scan_with_only_hidden_networks_notifies_nothing() {
    let mut h = Harness::start(FakeTools {
        scan_output: Some(HIDDEN_ONLY_OUTPUT),
        ..Default::default()
    });
    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;

    h.assert_quiet().await;
    assert_eq!(h.tools.calls(), vec!["scan"]);
}

#[tokio::test]
async fn test_commands_beyond_queue_capacity_are_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = Harness::start(FakeTools {
        scan_gate: Some(gate.clone()),
        ..Default::default()
    });
    h.host.start_notify(RESULT).await;

    // First command occupies the worker.
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    timeout(WAIT, async {
        while h.tools.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker never picked up the first command");

    for _ in 0..COMMAND_QUEUE_CAPACITY + 5 {
        h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    }
    // Writes are processed in order, so this read lands after all of them.
    let value = timeout(WAIT, h.host.read_value(COMMAND))
        .await
        .expect("dispatch blocked on a full queue")
        .unwrap();
    assert_eq!(value, b"SCAN_WIFI");

    gate.add_permits(100);
    for _ in 0..COMMAND_QUEUE_CAPACITY + 1 {
        let _ = h.next_value().await;
    }
    h.assert_quiet().await;
    assert_eq!(h.tools.calls().len(), COMMAND_QUEUE_CAPACITY + 1);
}

#[tokio::test]
async fn test_malformed_writes_are_stored_but_not_dispatched() {
    let mut h = Harness::start(FakeTools::default());
    h.host.start_notify(RESULT).await;

    for bad in [
        vec![0xff, 0xfe, 0x00],
        b"not json".to_vec(),
        br#"{"ssid":"x"}"#.to_vec(),
        b"[1,2,3]".to_vec(),
        b"scan_wifi".to_vec(),
    ] {
        h.host.write_value(COMMAND, bad.clone()).await;
        assert_eq!(h.host.read_value(COMMAND).await.unwrap(), bad);
    }
    assert!(h.tools.calls().is_empty());

    // The next valid command still works and is the first thing notified.
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    let networks: Vec<NetworkRecord> = serde_json::from_slice(&h.next_value().await).unwrap();
    assert_eq!(networks.len(), 2);
    assert_eq!(h.tools.calls(), vec!["scan"]);
}

#[tokio::test]
async fn test_read_returns_last_write() {
    let h = Harness::start(FakeTools::default());
    assert_eq!(h.host.read_value(COMMAND).await.unwrap(), vec![0x00]);

    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    assert_eq!(h.host.read_value(COMMAND).await.unwrap(), b"SCAN_WIFI");
}

#[tokio::test]
async fn test_results_dropped_without_subscription() {
    let mut h = Harness::start(FakeTools::default());
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;

    h.assert_quiet().await;
    assert_eq!(h.tools.calls(), vec!["scan"]);
}

#[tokio::test]
async fn test_start_and_stop_notify_are_idempotent() {
    let mut h = Harness::start(FakeTools::default());
    h.host.start_notify(RESULT).await;
    h.host.start_notify(RESULT).await;
    assert_eq!(
        h.host
            .get(RESULT, interfaces::GATT_CHARACTERISTIC, "UUID")
            .await
            .unwrap(),
        PropertyValue::String("12345678-1234-5678-1234-56789abcdef2".into())
    );

    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    let _ = h.next_value().await;

    h.host.stop_notify(RESULT).await;
    h.host.stop_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    h.assert_quiet().await;
}

#[tokio::test]
async fn test_consecutive_commands_notify_in_order() {
    let mut h = Harness::start(FakeTools::default());
    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    h.host
        .write_value(COMMAND, br#"{"ssid":"Office","password":"pw"}"#.to_vec())
        .await;

    let first: Vec<NetworkRecord> = serde_json::from_slice(&h.next_value().await).unwrap();
    assert_eq!(first.len(), 2);
    let _status = h.next_text().await;
    assert_eq!(h.next_text().await, "✅ Connected to Wi-Fi");
    assert_eq!(h.tools.calls(), vec!["scan", "list", "connect Office"]);
}

#[tokio::test]
async fn test_reads_stay_responsive_while_tool_hangs() {
    let h = Harness::start(FakeTools {
        scan_hangs: true,
        ..Default::default()
    });
    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;

    let value = timeout(WAIT, h.host.read_value(COMMAND))
        .await
        .expect("read blocked behind a hung scan")
        .unwrap();
    assert_eq!(value, b"SCAN_WIFI");

    let objects = timeout(WAIT, h.host.managed_objects())
        .await
        .expect("GetManagedObjects blocked behind a hung scan")
        .unwrap();
    assert_eq!(objects.len(), 3);
}

#[tokio::test]
async fn test_managed_objects_through_host_handle() {
    let h = Harness::start(FakeTools::default());
    let objects = h.host.managed_objects().await.unwrap();

    let service = &objects["/org/bluez/raspible/service0"][interfaces::GATT_SERVICE];
    assert_eq!(
        service["Characteristics"],
        PropertyValue::ObjectPaths(vec![COMMAND.to_string(), RESULT.to_string()])
    );

    let command = &objects[COMMAND][interfaces::GATT_CHARACTERISTIC];
    assert_eq!(
        command["Flags"],
        PropertyValue::Strings(vec!["read".into(), "write-without-response".into()])
    );

    let result = &objects[RESULT][interfaces::GATT_CHARACTERISTIC];
    assert_eq!(result["Flags"], PropertyValue::Strings(vec!["notify".into()]));

    assert!(h
        .host
        .get_all(COMMAND, "org.bluez.Nope1")
        .await
        .is_err());
}

#[tokio::test]
async fn test_processor_returns_tree_when_handles_drop() {
    let tools = Arc::new(FakeTools::default());
    let protocol = CommandProtocol::new(tools.clone(), tools);
    let (changes_tx, _changes) = mpsc::unbounded_channel();
    let (processor, host) = EventProcessor::new(
        GattApplication::provisioning(paths::DEFAULT_ROOT),
        protocol,
        changes_tx,
    );
    let task = tokio::spawn(processor.run());

    host.start_notify(RESULT).await;
    host.write_value(COMMAND, b"hello".to_vec()).await;
    drop(host);

    let app = timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(app.read_value(COMMAND).unwrap(), b"hello");
    let notify = app.services()[0].notify_characteristic().unwrap();
    assert_eq!(notify.state(), SubscriptionState::Subscribed);
}

#[tokio::test]
async fn test_failed_registration_does_not_stop_processing() {
    let mut h = Harness::start(FakeTools::default());

    let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_registration(
        RegistrationKind::Advertisement,
        async { Err::<(), _>("org.bluez.Error.Failed") },
        outcomes_tx,
        shutdown_rx,
    );
    let outcomes = timeout(WAIT, log_outcomes(outcomes_rx)).await.unwrap();
    assert_eq!(
        outcomes,
        vec![RegistrationOutcome {
            kind: RegistrationKind::Advertisement,
            result: Err("org.bluez.Error.Failed".into()),
        }]
    );

    h.host.start_notify(RESULT).await;
    h.host.write_value(COMMAND, b"SCAN_WIFI".to_vec()).await;
    let networks: Vec<NetworkRecord> = serde_json::from_slice(&h.next_value().await).unwrap();
    assert_eq!(networks.len(), 2);
}
