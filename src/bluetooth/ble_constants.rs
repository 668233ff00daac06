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

//! BLE service and characteristic UUIDs, object paths and BlueZ interface names.

use uuid::Uuid;

/// Provisioning GATT service UUID.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef1);

/// Command characteristic UUID (client writes commands here).
/// Properties: Read, Write Without Response
pub const COMMAND_UUID: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef0);

/// Result characteristic UUID (scan results and connect status are pushed here).
/// Properties: Notify
pub const RESULT_UUID: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef2);

/// BlueZ D-Bus interface names.
pub mod interfaces {
    pub const GATT_SERVICE: &str = "org.bluez.GattService1";
    pub const GATT_CHARACTERISTIC: &str = "org.bluez.GattCharacteristic1";
    pub const LE_ADVERTISEMENT: &str = "org.bluez.LEAdvertisement1";
}

/// Object path layout below the application root.
pub mod paths {
    /// Default application root path.
    pub const DEFAULT_ROOT: &str = "/org/bluez/raspible";

    pub fn service(root: &str, index: usize) -> String {
        format!("{}/service{}", root, index)
    }

    pub fn characteristic(service: &str, index: usize) -> String {
        format!("{}/char{}", service, index)
    }

    pub fn notify_characteristic(service: &str, index: usize) -> String {
        format!("{}/char_notify{}", service, index)
    }

    pub fn advertisement(root: &str, index: usize) -> String {
        format!("{}/advertisement{}", root, index)
    }
}

/// Characteristic flags as BlueZ spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicFlag {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
}

impl CharacteristicFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteWithoutResponse => "write-without-response",
            Self::Notify => "notify",
        }
    }
}

/// Command tokens and status markers carried over the characteristics.
pub mod wire {
    /// Literal command that requests a Wi-Fi scan.
    pub const SCAN_WIFI: &str = "SCAN_WIFI";

    /// Pushed after the connect tool succeeds.
    pub const CONNECTED_MARKER: &str = "✅ Connected to Wi-Fi";

    /// Pushed after the connect tool fails.
    pub const CONNECT_FAILED_MARKER: &str = "❌ Failed to connect";

    /// Status line when the name listing finds nothing.
    pub const NO_ESSIDS: &str = "No ESSIDs found";
}
