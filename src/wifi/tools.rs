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

//! Network tools: scanning and connecting through system commands.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::scanner::essid_lines;
use crate::bluetooth::protocol::Credential;
use crate::config::WifiConfig;

/// Failure of an external network tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Runs Wi-Fi scans.
#[async_trait]
pub trait NetworkScanTool: Send + Sync {
    /// Full scan of the wireless interface; raw tool output.
    async fn scan(&self) -> Result<String, ToolError>;

    /// Informal listing of visible network names, one per line.
    async fn list_network_names(&self) -> Result<String, ToolError>;
}

/// Applies Wi-Fi credentials.
#[async_trait]
pub trait NetworkConnectTool: Send + Sync {
    /// Connect with `credential`; returns the tool's diagnostic output.
    async fn connect(&self, credential: &Credential) -> Result<String, ToolError>;
}

/// Run a command (optionally through `sudo`) and capture stdout.
async fn run(use_sudo: bool, program: &str, args: &[&str]) -> Result<String, ToolError> {
    let (program, args): (&str, Vec<&str>) = if use_sudo {
        ("sudo", std::iter::once(program).chain(args.iter().copied()).collect())
    } else {
        (program, args.to_vec())
    };
    // Passwords never reach the logs.
    let command_line = format!("{} {}", program, args.first().copied().unwrap_or_default());
    debug!("Running {} ...", command_line);

    let output = Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            command: command_line,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Scanner backed by `iwlist`.
#[derive(Debug, Clone)]
pub struct IwlistScanTool {
    interface: String,
    use_sudo: bool,
}

impl IwlistScanTool {
    pub fn new(interface: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            interface: interface.into(),
            use_sudo,
        }
    }

    pub fn from_config(config: &WifiConfig) -> Self {
        Self::new(config.interface.clone(), config.use_sudo)
    }
}

#[async_trait]
impl NetworkScanTool for IwlistScanTool {
    async fn scan(&self) -> Result<String, ToolError> {
        run(self.use_sudo, "iwlist", &[&self.interface, "scan"]).await
    }

    async fn list_network_names(&self) -> Result<String, ToolError> {
        let output = run(self.use_sudo, "iwlist", &["scan"]).await?;
        Ok(essid_lines(&output))
    }
}

/// Connector backed by NetworkManager's `nmcli`.
#[derive(Debug, Clone)]
pub struct NmcliConnectTool {
    use_sudo: bool,
}

impl NmcliConnectTool {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    pub fn from_config(config: &WifiConfig) -> Self {
        Self::new(config.use_sudo)
    }
}

#[async_trait]
impl NetworkConnectTool for NmcliConnectTool {
    async fn connect(&self, credential: &Credential) -> Result<String, ToolError> {
        run(
            self.use_sudo,
            "nmcli",
            &[
                "device",
                "wifi",
                "connect",
                &credential.ssid,
                "password",
                &credential.password,
            ],
        )
        .await
    }
}
