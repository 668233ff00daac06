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

//! Command execution module.
//!
//! Runs decoded commands against the network tools on a worker task and
//! hands every result back to the event processor as a [`Push`]. The worker
//! takes one job at a time, so the pushes of one command always precede the
//! pushes of the next.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bluetooth::ble_constants::wire;
use crate::bluetooth::protocol::{encode_scan_results, Command, Credential};
use crate::bluetooth::ServiceId;
use crate::wifi::{parse_scan_output, NetworkConnectTool, NetworkScanTool, ToolError};

/// A decoded command waiting for the worker.
#[derive(Debug, Clone)]
pub struct CommandJob {
    /// Service whose notify characteristic receives the results.
    pub service: ServiceId,
    pub command: Command,
}

/// Bytes to push through a service's notify characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub service: ServiceId,
    pub bytes: Vec<u8>,
}

/// Sends pushes for one job back to the event processor.
struct PushSink<'a> {
    service: ServiceId,
    tx: &'a mpsc::Sender<Push>,
}

impl PushSink<'_> {
    async fn push(&self, bytes: Vec<u8>) {
        let push = Push {
            service: self.service,
            bytes,
        };
        if self.tx.send(push).await.is_err() {
            warn!("Event processor gone, dropping notification");
        }
    }
}

/// Status line for the credential flow, built from the name listing.
pub fn status_line(listing: Result<String, ToolError>) -> String {
    match listing {
        Ok(output) => {
            let output = output.trim();
            if output.is_empty() {
                wire::NO_ESSIDS.to_string()
            } else {
                output.to_string()
            }
        }
        Err(ToolError::Failed { stderr, .. }) => format!("Error: {}", stderr),
        Err(e) => format!("Error: {}", e),
    }
}

/// Executes commands with the configured tools.
#[derive(Clone)]
pub struct CommandProtocol {
    scan_tool: Arc<dyn NetworkScanTool>,
    connect_tool: Arc<dyn NetworkConnectTool>,
}

impl CommandProtocol {
    pub fn new(
        scan_tool: Arc<dyn NetworkScanTool>,
        connect_tool: Arc<dyn NetworkConnectTool>,
    ) -> Self {
        Self {
            scan_tool,
            connect_tool,
        }
    }

    async fn execute(&self, job: CommandJob, pushes: &mpsc::Sender<Push>) {
        let sink = PushSink {
            service: job.service,
            tx: pushes,
        };
        match job.command {
            Command::ScanWifi => self.scan_wifi(&sink).await,
            Command::ApplyCredential(credential) => self.apply_credential(credential, &sink).await,
        }
    }

    async fn scan_wifi(&self, sink: &PushSink<'_>) {
        info!("📡 Scanning for Wi-Fi networks...");
        let output = match self.scan_tool.scan().await {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to scan Wi-Fi: {}", e);
                return;
            }
        };

        let networks = parse_scan_output(&output);
        if networks.is_empty() {
            warn!("Scan found no networks, nothing to notify");
            return;
        }
        info!("Found {} networks", networks.len());

        match encode_scan_results(&networks) {
            Ok(json) => sink.push(json).await,
            Err(e) => error!("Failed to encode scan results: {}", e),
        }
    }

    async fn apply_credential(&self, credential: Credential, sink: &PushSink<'_>) {
        info!("📡 Applying credentials for SSID {}", credential.ssid);

        // Diagnostic only; the connect attempt runs whatever this returns.
        let status = status_line(self.scan_tool.list_network_names().await);
        debug!("Network listing: {}", status);
        sink.push(status.into_bytes()).await;

        match self.connect_tool.connect(&credential).await {
            Ok(diagnostic) => {
                info!("✅ Wi-Fi credentials accepted: {}", diagnostic.trim());
                sink.push(wire::CONNECTED_MARKER.as_bytes().to_vec()).await;
            }
            Err(e) => {
                error!("❌ Failed to connect to Wi-Fi: {}", e);
                sink.push(wire::CONNECT_FAILED_MARKER.as_bytes().to_vec()).await;
            }
        }
    }
}

/// Worker loop: one job at a time until the job queue closes.
pub async fn run_worker(
    protocol: CommandProtocol,
    jobs: async_channel::Receiver<CommandJob>,
    pushes: mpsc::Sender<Push>,
) {
    debug!("Command worker started");
    while let Ok(job) = jobs.recv().await {
        debug!("Executing command: {:?}", job.command);
        protocol.execute(job, &pushes).await;
    }
    debug!("Command worker stopped");
}
