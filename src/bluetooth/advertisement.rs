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

//! LE advertisement announcing the provisioning service.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::ble_constants::{interfaces, paths, SERVICE_UUID};
use super::properties::{self, GattError, PropertyMap, PropertyValue};

/// Default advertised local name.
pub const DEFAULT_LOCAL_NAME: &str = "RaspiBLE";

/// Peripheral advertisement.
#[derive(Debug, Clone)]
pub struct Advertisement {
    path: String,
    service_uuids: Vec<Uuid>,
    local_name: String,
    include_tx_power: bool,
}

impl Advertisement {
    pub fn new(root: &str, index: usize, local_name: impl Into<String>) -> Self {
        Self {
            path: paths::advertisement(root, index),
            service_uuids: vec![SERVICE_UUID],
            local_name: local_name.into(),
            include_tx_power: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn includes(&self) -> Vec<String> {
        if self.include_tx_power {
            vec!["tx-power".to_string()]
        } else {
            Vec::new()
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("Type".into(), PropertyValue::String("peripheral".into()));
        props.insert(
            "ServiceUUIDs".into(),
            PropertyValue::Strings(self.service_uuids.iter().map(Uuid::to_string).collect()),
        );
        props.insert("LocalName".into(), PropertyValue::String(self.local_name.clone()));
        props.insert("Includes".into(), PropertyValue::Strings(self.includes()));
        props
    }

    /// `Properties.GetAll` on the `LEAdvertisement1` interface.
    pub fn get_all(&self, interface: &str) -> Result<PropertyMap, GattError> {
        properties::get_all(interfaces::LE_ADVERTISEMENT, self.properties(), interface)
    }

    /// Build the advertisement BlueZ registers through bluer.
    pub fn to_bluer(&self) -> bluer::adv::Advertisement {
        let mut system_includes = BTreeSet::new();
        if self.include_tx_power {
            system_includes.insert(bluer::adv::Feature::TxPower);
        }

        bluer::adv::Advertisement {
            advertisement_type: bluer::adv::Type::Peripheral,
            service_uuids: self.service_uuids.iter().copied().collect(),
            local_name: Some(self.local_name.clone()),
            system_includes,
            discoverable: Some(true),
            ..Default::default()
        }
    }
}
