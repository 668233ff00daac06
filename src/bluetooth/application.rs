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

//! GATT application and service object tree.
//!
//! The tree is a plain owned value: the application owns its services, each
//! service owns its characteristics. Every exposed object is one of a closed
//! set of variants ([`ObjectNode`]), so property queries and path lookups are
//! exhaustive matches.

use uuid::Uuid;

use super::ble_constants::{interfaces, paths, CharacteristicFlag, COMMAND_UUID, RESULT_UUID, SERVICE_UUID};
use super::characteristic::{Characteristic, NotifyCharacteristic, PushOutcome, ServiceId};
use super::properties::{self, GattError, InterfaceMap, ManagedObjects, PropertyMap, PropertyValue};

/// A characteristic owned by a service.
#[derive(Debug, Clone)]
pub enum ServiceCharacteristic {
    Writable(Characteristic),
    Notify(NotifyCharacteristic),
}

impl ServiceCharacteristic {
    pub fn path(&self) -> &str {
        match self {
            Self::Writable(ch) => ch.path(),
            Self::Notify(ch) => ch.path(),
        }
    }
}

/// A primary or secondary GATT service.
#[derive(Debug, Clone)]
pub struct GattService {
    id: ServiceId,
    path: String,
    uuid: Uuid,
    primary: bool,
    characteristics: Vec<ServiceCharacteristic>,
}

impl GattService {
    fn new(id: ServiceId, path: String, uuid: Uuid, primary: bool) -> Self {
        Self {
            id,
            path,
            uuid,
            primary,
            characteristics: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn characteristics(&self) -> &[ServiceCharacteristic] {
        &self.characteristics
    }

    /// Add a read/write characteristic; returns its path.
    pub fn add_characteristic(&mut self, uuid: Uuid, flags: Vec<CharacteristicFlag>) -> String {
        let path = paths::characteristic(&self.path, self.characteristics.len());
        self.characteristics
            .push(ServiceCharacteristic::Writable(Characteristic::new(
                path.clone(),
                uuid,
                flags,
                self.id,
            )));
        path
    }

    /// Add a notify characteristic; returns its path.
    pub fn add_notify_characteristic(&mut self, uuid: Uuid) -> String {
        let path = paths::notify_characteristic(&self.path, self.characteristics.len());
        self.characteristics
            .push(ServiceCharacteristic::Notify(NotifyCharacteristic::new(
                path.clone(),
                uuid,
                self.id,
            )));
        path
    }

    /// The notify characteristic results are pushed through.
    pub fn notify_characteristic(&self) -> Option<&NotifyCharacteristic> {
        self.characteristics.iter().find_map(|ch| match ch {
            ServiceCharacteristic::Notify(n) => Some(n),
            ServiceCharacteristic::Writable(_) => None,
        })
    }

    fn notify_characteristic_mut(&mut self) -> Option<&mut NotifyCharacteristic> {
        self.characteristics.iter_mut().find_map(|ch| match ch {
            ServiceCharacteristic::Notify(n) => Some(n),
            ServiceCharacteristic::Writable(_) => None,
        })
    }

    /// `org.bluez.GattService1` properties.
    pub fn properties(&self) -> InterfaceMap {
        let mut props = PropertyMap::new();
        props.insert("UUID".into(), PropertyValue::String(self.uuid.to_string()));
        props.insert("Primary".into(), PropertyValue::Bool(self.primary));
        props.insert(
            "Characteristics".into(),
            PropertyValue::ObjectPaths(
                self.characteristics
                    .iter()
                    .map(|ch| ch.path().to_string())
                    .collect(),
            ),
        );

        let mut map = InterfaceMap::new();
        map.insert(interfaces::GATT_SERVICE.to_string(), props);
        map
    }
}

/// Borrowed view of any object exposed to the host.
#[derive(Debug, Clone, Copy)]
pub enum ObjectNode<'a> {
    Service(&'a GattService),
    Characteristic {
        characteristic: &'a Characteristic,
        service_path: &'a str,
    },
    Notify {
        characteristic: &'a NotifyCharacteristic,
        service_path: &'a str,
    },
}

impl<'a> ObjectNode<'a> {
    pub fn path(&self) -> &'a str {
        match self {
            Self::Service(s) => s.path(),
            Self::Characteristic { characteristic, .. } => characteristic.path(),
            Self::Notify { characteristic, .. } => characteristic.path(),
        }
    }

    /// The single interface this object implements.
    pub fn interface(&self) -> &'static str {
        match self {
            Self::Service(_) => interfaces::GATT_SERVICE,
            Self::Characteristic { .. } | Self::Notify { .. } => interfaces::GATT_CHARACTERISTIC,
        }
    }

    pub fn properties(&self) -> InterfaceMap {
        match self {
            Self::Service(s) => s.properties(),
            Self::Characteristic {
                characteristic,
                service_path,
            } => characteristic.properties(service_path),
            Self::Notify {
                characteristic,
                service_path,
            } => characteristic.properties(service_path),
        }
    }

    fn interface_properties(&self) -> PropertyMap {
        self.properties()
            .remove(self.interface())
            .unwrap_or_default()
    }
}

/// Root of the exposed object tree.
#[derive(Debug, Clone)]
pub struct GattApplication {
    path: String,
    services: Vec<GattService>,
}

impl GattApplication {
    /// Create an empty application rooted at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            services: Vec::new(),
        }
    }

    /// The provisioning application: one primary service with a command
    /// characteristic and a result notify characteristic.
    pub fn provisioning(root: impl Into<String>) -> Self {
        let mut app = Self::new(root);
        let id = app.add_service(SERVICE_UUID, true);
        if let Some(service) = app.service_mut(id) {
            service.add_characteristic(
                COMMAND_UUID,
                vec![CharacteristicFlag::Read, CharacteristicFlag::WriteWithoutResponse],
            );
            service.add_notify_characteristic(RESULT_UUID);
        }
        app
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register a service; order of registration is discovery order.
    pub fn add_service(&mut self, uuid: Uuid, primary: bool) -> ServiceId {
        let id = ServiceId(self.services.len());
        let path = paths::service(&self.path, id.0);
        self.services.push(GattService::new(id, path, uuid, primary));
        id
    }

    pub fn services(&self) -> &[GattService] {
        &self.services
    }

    pub fn service(&self, id: ServiceId) -> Option<&GattService> {
        self.services.get(id.0)
    }

    pub fn service_mut(&mut self, id: ServiceId) -> Option<&mut GattService> {
        self.services.get_mut(id.0)
    }

    /// Every service and characteristic, in registration order.
    pub fn objects(&self) -> impl Iterator<Item = ObjectNode<'_>> {
        self.services.iter().flat_map(|service| {
            std::iter::once(ObjectNode::Service(service)).chain(
                service.characteristics.iter().map(move |ch| match ch {
                    ServiceCharacteristic::Writable(c) => ObjectNode::Characteristic {
                        characteristic: c,
                        service_path: service.path(),
                    },
                    ServiceCharacteristic::Notify(n) => ObjectNode::Notify {
                        characteristic: n,
                        service_path: service.path(),
                    },
                }),
            )
        })
    }

    /// `ObjectManager.GetManagedObjects`: live property maps of every object
    /// below the root.
    pub fn managed_objects(&self) -> ManagedObjects {
        self.objects()
            .map(|node| (node.path().to_string(), node.properties()))
            .collect()
    }

    pub fn object(&self, path: &str) -> Result<ObjectNode<'_>, GattError> {
        self.objects()
            .find(|node| node.path() == path)
            .ok_or_else(|| GattError::UnknownObject(path.to_string()))
    }

    /// `Properties.GetAll`.
    pub fn get_all(&self, path: &str, interface: &str) -> Result<PropertyMap, GattError> {
        let node = self.object(path)?;
        properties::get_all(node.interface(), node.interface_properties(), interface)
    }

    /// `Properties.Get`.
    pub fn get(
        &self,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<PropertyValue, GattError> {
        let node = self.object(path)?;
        properties::get(node.interface(), node.interface_properties(), interface, property)
    }

    fn locate(&self, path: &str) -> Result<(usize, usize), GattError> {
        self.services
            .iter()
            .enumerate()
            .find_map(|(s, service)| {
                service
                    .characteristics
                    .iter()
                    .position(|ch| ch.path() == path)
                    .map(|c| (s, c))
            })
            .ok_or_else(|| GattError::UnknownObject(path.to_string()))
    }

    fn entry_mut(&mut self, path: &str) -> Result<&mut ServiceCharacteristic, GattError> {
        let (s, c) = self.locate(path)?;
        Ok(&mut self.services[s].characteristics[c])
    }

    /// Store written bytes; returns the owning service for command dispatch.
    pub fn write_value(&mut self, path: &str, value: Vec<u8>) -> Result<ServiceId, GattError> {
        match self.entry_mut(path)? {
            ServiceCharacteristic::Writable(ch) => {
                ch.write_value(value);
                Ok(ch.service())
            }
            ServiceCharacteristic::Notify(_) => Err(GattError::NotSupported(path.to_string())),
        }
    }

    pub fn read_value(&self, path: &str) -> Result<Vec<u8>, GattError> {
        match self.object(path)? {
            ObjectNode::Characteristic { characteristic, .. } => {
                Ok(characteristic.read_value().to_vec())
            }
            _ => Err(GattError::NotSupported(path.to_string())),
        }
    }

    pub fn start_notify(&mut self, path: &str) -> Result<(), GattError> {
        match self.entry_mut(path)? {
            ServiceCharacteristic::Notify(ch) => {
                ch.start_notify();
                Ok(())
            }
            ServiceCharacteristic::Writable(_) => Err(GattError::NotSupported(path.to_string())),
        }
    }

    pub fn stop_notify(&mut self, path: &str) -> Result<(), GattError> {
        match self.entry_mut(path)? {
            ServiceCharacteristic::Notify(ch) => {
                ch.stop_notify();
                Ok(())
            }
            ServiceCharacteristic::Writable(_) => Err(GattError::NotSupported(path.to_string())),
        }
    }

    /// Push through the notify characteristic of `service`.
    pub fn push(&mut self, service: ServiceId, bytes: Vec<u8>) -> Result<PushOutcome, GattError> {
        let owner = self
            .services
            .get_mut(service.0)
            .ok_or_else(|| GattError::UnknownObject(format!("service{}", service.0)))?;
        let path = owner.path.clone();
        let notify = owner
            .notify_characteristic_mut()
            .ok_or(GattError::NotSupported(path))?;
        Ok(notify.push(bytes))
    }
}
