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

//! Parser for `iwlist <iface> scan` output.
//!
//! `iwlist` prints one cell per network:
//!
//! ```text
//! Cell 01 - Address: AA:BB:CC:DD:EE:FF
//!           Channel:6
//!           ESSID:"Home"
//! ```
//!
//! Addresses and names are paired by their order of appearance.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One network found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Hardware address, `XX:XX:XX:XX:XX:XX`.
    pub address: String,
    /// Network name, never empty.
    pub essid: String,
}

fn cell_regex() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        Regex::new(r"Cell \d+ - Address: ([\da-fA-F:]{17})").expect("cell pattern is valid")
    })
}

fn essid_regex() -> &'static Regex {
    static ESSID: OnceLock<Regex> = OnceLock::new();
    ESSID.get_or_init(|| Regex::new(r#"ESSID:"(.*?)""#).expect("essid pattern is valid"))
}

/// Extract unique networks from raw scan text.
///
/// The first occurrence of each name wins and empty names are dropped. The
/// result keeps first-seen order. Malformed or empty input yields an empty
/// list.
pub fn parse_scan_output(output: &str) -> Vec<NetworkRecord> {
    let addresses = cell_regex()
        .captures_iter(output)
        .map(|c| c[1].to_ascii_uppercase());
    let essids = essid_regex()
        .captures_iter(output)
        .map(|c| c[1].to_string());

    let mut seen = HashSet::new();
    addresses
        .zip(essids)
        .filter(|(_, essid)| !essid.is_empty())
        .filter(|(_, essid)| seen.insert(essid.clone()))
        .map(|(address, essid)| NetworkRecord { address, essid })
        .collect()
}

/// Keep only the `ESSID` lines of scan output, trimmed.
pub fn essid_lines(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.contains("ESSID"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}
