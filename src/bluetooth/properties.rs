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

//! Property maps exposed to the host Bluetooth manager.

use std::collections::BTreeMap;
use thiserror::Error;

/// A typed property value, mirroring the D-Bus signatures BlueZ expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// `s`
    String(String),
    /// `b`
    Bool(bool),
    /// `o`
    ObjectPath(String),
    /// `ao`
    ObjectPaths(Vec<String>),
    /// `as`
    Strings(Vec<String>),
    /// `ay`
    Bytes(Vec<u8>),
}

impl PropertyValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Property name to value.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Interface name to its properties.
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

/// Object path to its interfaces, as returned by `GetManagedObjects`.
pub type ManagedObjects = BTreeMap<String, InterfaceMap>;

/// Faults reported back to the host manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    #[error("Invalid interface: {0}")]
    UnknownInterface(String),
    #[error("Unknown property {property} on {interface}")]
    UnknownProperty { interface: String, property: String },
    #[error("No object at path {0}")]
    UnknownObject(String),
    #[error("Operation not supported on {0}")]
    NotSupported(String),
}

/// Pure lookup of a whole interface, used by `GetAll`.
pub fn get_all(
    declared: &str,
    properties: PropertyMap,
    interface: &str,
) -> Result<PropertyMap, GattError> {
    if interface != declared {
        return Err(GattError::UnknownInterface(interface.to_string()));
    }
    Ok(properties)
}

/// Pure lookup of a single property, used by `Get`.
pub fn get(
    declared: &str,
    mut properties: PropertyMap,
    interface: &str,
    property: &str,
) -> Result<PropertyValue, GattError> {
    if interface != declared {
        return Err(GattError::UnknownInterface(interface.to_string()));
    }
    properties
        .remove(property)
        .ok_or_else(|| GattError::UnknownProperty {
            interface: interface.to_string(),
            property: property.to_string(),
        })
}

/// `PropertiesChanged` signal payload emitted when a notify value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Object that changed.
    pub path: String,
    /// Interface carrying the changed property.
    pub interface: String,
    /// Changed properties (always exactly `Value` here).
    pub changed: PropertyMap,
    /// Invalidated property names (always empty here).
    pub invalidated: Vec<String>,
}

impl ChangeNotification {
    /// The pushed bytes, if the change carries a `Value`.
    pub fn value(&self) -> Option<&[u8]> {
        self.changed.get("Value").and_then(PropertyValue::as_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("UUID".into(), PropertyValue::String("abc".into()));
        props
    }

    #[test]
    fn test_get_all_checks_interface() {
        assert_eq!(get_all("iface", sample(), "iface").unwrap(), sample());
        assert_eq!(
            get_all("iface", sample(), "other"),
            Err(GattError::UnknownInterface("other".into()))
        );
    }

    #[test]
    fn test_get_single_property() {
        assert_eq!(
            get("iface", sample(), "iface", "UUID").unwrap(),
            PropertyValue::String("abc".into())
        );
        assert!(matches!(
            get("iface", sample(), "iface", "Flags"),
            Err(GattError::UnknownProperty { .. })
        ));
        assert!(matches!(
            get("iface", sample(), "nope", "UUID"),
            Err(GattError::UnknownInterface(_))
        ));
    }
}
