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

//! Writable and notifying GATT characteristics.
//!
//! Both kinds refer to their owning service through a [`ServiceId`], an index
//! into the application's service table. The owner's path is resolved by the
//! caller at query time.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ble_constants::{interfaces, CharacteristicFlag};
use super::properties::{ChangeNotification, InterfaceMap, PropertyMap, PropertyValue};

/// Index of a service inside its [`GattApplication`](super::GattApplication).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub usize);

/// Read/write characteristic that receives commands.
#[derive(Debug, Clone)]
pub struct Characteristic {
    path: String,
    uuid: Uuid,
    flags: Vec<CharacteristicFlag>,
    service: ServiceId,
    value: Vec<u8>,
}

impl Characteristic {
    pub fn new(
        path: impl Into<String>,
        uuid: Uuid,
        flags: Vec<CharacteristicFlag>,
        service: ServiceId,
    ) -> Self {
        Self {
            path: path.into(),
            uuid,
            flags,
            service,
            value: vec![0x00],
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn has_flag(&self, flag: CharacteristicFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_readable(&self) -> bool {
        self.has_flag(CharacteristicFlag::Read)
    }

    /// Store the written bytes. Always succeeds.
    pub fn write_value(&mut self, value: Vec<u8>) {
        debug!("WriteValue on {}: {} bytes", self.path, value.len());
        self.value = value;
    }

    /// Last written bytes.
    pub fn read_value(&self) -> &[u8] {
        debug!("ReadValue on {}", self.path);
        &self.value
    }

    /// `org.bluez.GattCharacteristic1` properties.
    pub fn properties(&self, service_path: &str) -> InterfaceMap {
        let mut props = PropertyMap::new();
        props.insert("UUID".into(), PropertyValue::String(self.uuid.to_string()));
        props.insert(
            "Service".into(),
            PropertyValue::ObjectPath(service_path.to_string()),
        );
        props.insert(
            "Flags".into(),
            PropertyValue::Strings(self.flags.iter().map(|f| f.as_str().to_string()).collect()),
        );
        if self.is_readable() {
            props.insert("Value".into(), PropertyValue::Bytes(self.value.clone()));
        }

        let mut map = InterfaceMap::new();
        map.insert(interfaces::GATT_CHARACTERISTIC.to_string(), props);
        map
    }
}

/// Subscription state of a notifying characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribed,
}

/// Result of [`NotifyCharacteristic::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Value replaced; the change must be signalled to the host.
    Notified(ChangeNotification),
    /// Nobody subscribed; nothing changed.
    NotSubscribed,
}

/// Notify-only characteristic that pushes results to the subscribed client.
#[derive(Debug, Clone)]
pub struct NotifyCharacteristic {
    path: String,
    uuid: Uuid,
    service: ServiceId,
    state: SubscriptionState,
    value: Vec<u8>,
}

impl NotifyCharacteristic {
    pub fn new(path: impl Into<String>, uuid: Uuid, service: ServiceId) -> Self {
        Self {
            path: path.into(),
            uuid,
            service,
            state: SubscriptionState::Unsubscribed,
            value: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.state == SubscriptionState::Subscribed
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn start_notify(&mut self) {
        if !self.is_subscribed() {
            info!("🔔 StartNotify on {}", self.path);
        }
        self.state = SubscriptionState::Subscribed;
    }

    pub fn stop_notify(&mut self) {
        if self.is_subscribed() {
            info!("🔕 StopNotify on {}", self.path);
        }
        self.state = SubscriptionState::Unsubscribed;
    }

    /// Replace the current value if a client is subscribed.
    ///
    /// Identical content is pushed again; callers own any de-duplication.
    pub fn push(&mut self, bytes: Vec<u8>) -> PushOutcome {
        if !self.is_subscribed() {
            warn!("⚠️ Cannot notify on {}, client hasn't subscribed", self.path);
            return PushOutcome::NotSubscribed;
        }

        self.value = bytes;

        let mut changed = PropertyMap::new();
        changed.insert("Value".into(), PropertyValue::Bytes(self.value.clone()));

        PushOutcome::Notified(ChangeNotification {
            path: self.path.clone(),
            interface: interfaces::GATT_CHARACTERISTIC.to_string(),
            changed,
            invalidated: Vec::new(),
        })
    }

    /// `org.bluez.GattCharacteristic1` properties.
    pub fn properties(&self, service_path: &str) -> InterfaceMap {
        let mut props = PropertyMap::new();
        props.insert("UUID".into(), PropertyValue::String(self.uuid.to_string()));
        props.insert(
            "Service".into(),
            PropertyValue::ObjectPath(service_path.to_string()),
        );
        props.insert(
            "Flags".into(),
            PropertyValue::Strings(vec![CharacteristicFlag::Notify.as_str().to_string()]),
        );
        props.insert("Value".into(), PropertyValue::Bytes(self.value.clone()));

        let mut map = InterfaceMap::new();
        map.insert(interfaces::GATT_CHARACTERISTIC.to_string(), props);
        map
    }
}
