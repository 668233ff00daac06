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

//! BlueZ bridge for the GATT object tree.
//!
//! The bridge discovers the tree through `GetManagedObjects`, the same way
//! BlueZ would, and mirrors it into a bluer [`Application`]. Every bluer
//! callback is forwarded to the event processor as a host call; change
//! notifications flow back to the active notify session.

use anyhow::{anyhow, Result};
use bluer::gatt::local::{
    Application, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicReadRequest,
    CharacteristicWrite, CharacteristicWriteMethod, CharacteristicWriteRequest, ReqError, Service,
};
use bluer::{Adapter, Address};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::advertisement::Advertisement;
use super::ble_constants::{interfaces, CharacteristicFlag};
use super::properties::{ChangeNotification, ManagedObjects, PropertyMap, PropertyValue};
use super::registration::{spawn_registration, RegistrationKind, RegistrationOutcome};
use crate::config::BluetoothConfig;
use crate::events::HostHandle;

/// Change notifications shared by notify sessions. One session at a time.
type SharedChanges = Arc<Mutex<mpsc::UnboundedReceiver<ChangeNotification>>>;

/// GATT server bound to one Bluetooth adapter.
pub struct GattServer {
    adapter: Adapter,
    shutdown: watch::Sender<bool>,
    registrations: Vec<JoinHandle<()>>,
}

impl GattServer {
    /// Open a BlueZ session and pick the configured (or default) adapter.
    pub async fn new(config: &BluetoothConfig) -> Result<Self> {
        info!("Initializing BLE GATT server...");

        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = match &config.adapter {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| anyhow!("❌ No Bluetooth adapter found: {}", e))?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            adapter,
            shutdown,
            registrations: Vec::new(),
        })
    }

    /// Get the adapter address.
    pub async fn address(&self) -> Result<Address> {
        Ok(self.adapter.address().await?)
    }

    /// Set the device name.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.adapter.set_alias(name.to_string()).await?;
        info!("Bluetooth name set to: {}", name);
        Ok(())
    }

    /// Register the GATT application and the advertisement.
    ///
    /// Both registrations run in the background and report on `outcomes`;
    /// a failed registration leaves the processor running but the service
    /// undiscoverable.
    pub async fn start(
        &mut self,
        host: &HostHandle,
        advertisement: &Advertisement,
        changes: mpsc::UnboundedReceiver<ChangeNotification>,
        outcomes: mpsc::UnboundedSender<RegistrationOutcome>,
    ) -> Result<()> {
        let objects = host.managed_objects().await?;
        let changes = Arc::new(Mutex::new(changes));
        let app = build_application(&objects, host, &changes)?;
        info!("GATT application built with {} service(s)", app.services.len());

        let adapter = self.adapter.clone();
        self.registrations.push(spawn_registration(
            RegistrationKind::Application,
            async move { adapter.serve_gatt_application(app).await },
            outcomes.clone(),
            self.shutdown.subscribe(),
        ));

        let adapter = self.adapter.clone();
        let adv = advertisement.to_bluer();
        self.registrations.push(spawn_registration(
            RegistrationKind::Advertisement,
            async move { adapter.advertise(adv).await },
            outcomes,
            self.shutdown.subscribe(),
        ));

        Ok(())
    }

    /// Drop both registrations and wait for them to unregister.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.registrations.drain(..) {
            if let Err(e) = task.await {
                error!("Registration task failed: {}", e);
            }
        }
        info!("GATT server stopped");
    }
}

fn uuid_of(path: &str, props: &PropertyMap) -> Result<Uuid> {
    match props.get("UUID") {
        Some(PropertyValue::String(s)) => Ok(Uuid::parse_str(s)?),
        _ => Err(anyhow!("{} has no UUID", path)),
    }
}

fn flags_of(props: &PropertyMap) -> Vec<String> {
    match props.get("Flags") {
        Some(PropertyValue::Strings(flags)) => flags.clone(),
        _ => Vec::new(),
    }
}

/// Mirror the managed objects into a bluer application.
fn build_application(
    objects: &ManagedObjects,
    host: &HostHandle,
    changes: &SharedChanges,
) -> Result<Application> {
    let mut service_entries: Vec<_> = objects
        .iter()
        .filter_map(|(path, ifaces)| Some((path, ifaces.get(interfaces::GATT_SERVICE)?)))
        .collect();
    // Service paths end in their registration index; shortlex order restores it.
    service_entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut services = Vec::new();

    for (path, props) in service_entries {

        let children = match props.get("Characteristics") {
            Some(PropertyValue::ObjectPaths(children)) => children.as_slice(),
            _ => &[],
        };

        let characteristics = children
            .iter()
            .map(|child| {
                let props = objects
                    .get(child)
                    .and_then(|i| i.get(interfaces::GATT_CHARACTERISTIC))
                    .ok_or_else(|| anyhow!("{} lists unknown characteristic {}", path, child))?;
                build_characteristic(child, props, host, changes)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Service {} with {} characteristic(s)", path, characteristics.len());
        services.push(Service {
            uuid: uuid_of(path, props)?,
            primary: matches!(props.get("Primary"), Some(PropertyValue::Bool(true))),
            characteristics,
            ..Default::default()
        });
    }

    Ok(Application {
        services,
        ..Default::default()
    })
}

fn build_characteristic(
    path: &str,
    props: &PropertyMap,
    host: &HostHandle,
    changes: &SharedChanges,
) -> Result<Characteristic> {
    let flags = flags_of(props);
    let has = |flag: CharacteristicFlag| flags.iter().any(|f| f == flag.as_str());

    let read = has(CharacteristicFlag::Read).then(|| {
        let host = host.clone();
        let path = path.to_string();
        CharacteristicRead {
            read: true,
            fun: Box::new(move |_req: CharacteristicReadRequest| {
                let host = host.clone();
                let path = path.clone();
                async move {
                    host.read_value(&path).await.map_err(|e| {
                        error!("ReadValue on {} failed: {}", path, e);
                        ReqError::Failed
                    })
                }
                .boxed()
            }),
            ..Default::default()
        }
    });

    let write_flag = has(CharacteristicFlag::Write);
    let write_without_response = has(CharacteristicFlag::WriteWithoutResponse);
    let write = (write_flag || write_without_response).then(|| {
        let host = host.clone();
        let path = path.to_string();
        CharacteristicWrite {
            write: write_flag,
            write_without_response,
            method: CharacteristicWriteMethod::Fun(Box::new(
                move |value: Vec<u8>, _req: CharacteristicWriteRequest| {
                    let host = host.clone();
                    let path = path.clone();
                    async move {
                        host.write_value(&path, value).await;
                        Ok(())
                    }
                    .boxed()
                },
            )),
            ..Default::default()
        }
    });

    let notify = has(CharacteristicFlag::Notify).then(|| {
        let host = host.clone();
        let path = path.to_string();
        let changes = changes.clone();
        CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(
                move |notifier: CharacteristicNotifier| {
                    notify_session(notifier, path.clone(), host.clone(), changes.clone()).boxed()
                },
            )),
            ..Default::default()
        }
    });

    Ok(Characteristic {
        uuid: uuid_of(path, props)?,
        read,
        write,
        notify,
        ..Default::default()
    })
}

/// One client subscription. Holds the change receiver from StartNotify until
/// its StopNotify is queued, so a following session's StartNotify always
/// reaches the processor after it.
struct NotifySession {
    path: String,
    host: HostHandle,
    changes: OwnedMutexGuard<mpsc::UnboundedReceiver<ChangeNotification>>,
}

impl NotifySession {
    async fn open(path: String, host: HostHandle, changes: SharedChanges) -> Self {
        let mut changes = changes.lock_owned().await;
        // Anything queued belongs to an earlier session.
        while changes.try_recv().is_ok() {}

        host.start_notify(&path).await;
        debug!("Notification session started on {}", path);

        Self {
            path,
            host,
            changes,
        }
    }

    /// Next value pushed on this path; `None` once the processor is gone.
    async fn next_value(&mut self) -> Option<Vec<u8>> {
        loop {
            let change = self.changes.recv().await?;
            if change.path != self.path {
                continue;
            }
            if let Some(value) = change.value() {
                return Some(value.to_vec());
            }
        }
    }

    async fn close(self) {
        self.host.stop_notify(&self.path).await;
        info!("Notification session on {} ended", self.path);
    }
}

async fn notify_session(
    mut notifier: CharacteristicNotifier,
    path: String,
    host: HostHandle,
    changes: SharedChanges,
) {
    let mut session = NotifySession::open(path, host, changes).await;

    loop {
        let value = tokio::select! {
            value = session.next_value() => value,
            _ = notifier.stopped() => break,
        };
        let Some(value) = value else {
            break;
        };
        if let Err(e) = notifier.notify(value).await {
            error!("Failed to send notification: {}", e);
            break;
        }
    }

    session.close().await;
}
