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

//! Bluetooth module.
//!
//! GATT object tree, command protocol and the BlueZ bridge that exposes
//! them to BLE clients.

mod advertisement;
mod application;
pub mod ble_constants;
mod characteristic;
mod gatt_server;
mod properties;
pub mod protocol;
pub mod registration;

pub use advertisement::{Advertisement, DEFAULT_LOCAL_NAME};
pub use application::{GattApplication, GattService, ObjectNode, ServiceCharacteristic};
pub use characteristic::{
    Characteristic, NotifyCharacteristic, PushOutcome, ServiceId, SubscriptionState,
};
pub use gatt_server::GattServer;
pub use properties::{
    ChangeNotification, GattError, InterfaceMap, ManagedObjects, PropertyMap, PropertyValue,
};
