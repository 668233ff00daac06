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

//! Command protocol carried over the command characteristic.
//!
//! Writes are UTF-8 text. The literal `SCAN_WIFI` requests a scan; a JSON
//! object with non-empty `ssid` and `password` strings requests a connection.
//! Anything else is rejected with a [`CommandError`] and only stored.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::ble_constants::wire;
use crate::wifi::NetworkRecord;

/// Decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan for networks and notify the de-duplicated list.
    ScanWifi,
    /// Notify a status line, then connect with the credential.
    ApplyCredential(Credential),
}

/// Wi-Fi credential. Lives for one command dispatch only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub ssid: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why a write did not produce a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid UTF-8 in command: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("JSON decode error: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Command JSON is not an object")]
    NotAnObject,
    #[error("Missing SSID or password")]
    MissingCredential,
}

impl Command {
    /// Decode the raw bytes of a characteristic write.
    pub fn decode(bytes: &[u8]) -> Result<Self, CommandError> {
        let text = std::str::from_utf8(bytes)?;
        if text == wire::SCAN_WIFI {
            return Ok(Self::ScanWifi);
        }

        let json: Value = serde_json::from_str(text)?;
        let object = json.as_object().ok_or(CommandError::NotAnObject)?;

        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match (field("ssid"), field("password")) {
            (Some(ssid), Some(password)) => Ok(Self::ApplyCredential(Credential { ssid, password })),
            _ => Err(CommandError::MissingCredential),
        }
    }
}

/// Encode scan results as the JSON array pushed to the client.
pub fn encode_scan_results(records: &[NetworkRecord]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(records)
}
