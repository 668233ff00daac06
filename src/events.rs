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

//! Event processing and command dispatch.
//!
//! The [`EventProcessor`] owns the GATT object tree and is its only writer.
//! Host calls reach it as [`HostRequest`]s through a [`HostHandle`]; command
//! results come back from the worker as [`Push`]es. Tool invocations never run
//! on this task, so reads and property queries stay responsive while a scan or
//! connect is in flight.

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bluetooth::protocol::Command;
use crate::bluetooth::{
    ChangeNotification, GattApplication, GattError, ManagedObjects, PropertyMap, PropertyValue,
    PushOutcome, ServiceId,
};
use crate::commands::{run_worker, CommandJob, CommandProtocol, Push};

/// Commands waiting behind the one in flight. Writes beyond this are dropped.
pub const COMMAND_QUEUE_CAPACITY: usize = 8;

/// Calls made by the host Bluetooth manager.
#[derive(Debug)]
pub enum HostRequest {
    GetManagedObjects {
        reply: oneshot::Sender<ManagedObjects>,
    },
    Get {
        path: String,
        interface: String,
        property: String,
        reply: oneshot::Sender<Result<PropertyValue, GattError>>,
    },
    GetAll {
        path: String,
        interface: String,
        reply: oneshot::Sender<Result<PropertyMap, GattError>>,
    },
    ReadValue {
        path: String,
        reply: oneshot::Sender<Result<Vec<u8>, GattError>>,
    },
    WriteValue {
        path: String,
        value: Vec<u8>,
    },
    StartNotify {
        path: String,
    },
    StopNotify {
        path: String,
    },
}

/// Cloneable handle the host bridge uses to reach the event processor.
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostRequest>,
}

impl HostHandle {
    /// Wrap a raw request sender, for hosts that drive the processor directly.
    pub fn from_sender(tx: mpsc::Sender<HostRequest>) -> Self {
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HostRequest) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| anyhow!("Event processor stopped"))?;
        rx.await.map_err(|_| anyhow!("Event processor dropped the request"))
    }

    async fn send(&self, request: HostRequest) {
        if self.tx.send(request).await.is_err() {
            warn!("Event processor stopped, dropping host request");
        }
    }

    pub async fn managed_objects(&self) -> Result<ManagedObjects> {
        self.request(|reply| HostRequest::GetManagedObjects { reply })
            .await
    }

    pub async fn get(&self, path: &str, interface: &str, property: &str) -> Result<PropertyValue> {
        Ok(self
            .request(|reply| HostRequest::Get {
                path: path.to_string(),
                interface: interface.to_string(),
                property: property.to_string(),
                reply,
            })
            .await??)
    }

    pub async fn get_all(&self, path: &str, interface: &str) -> Result<PropertyMap> {
        Ok(self
            .request(|reply| HostRequest::GetAll {
                path: path.to_string(),
                interface: interface.to_string(),
                reply,
            })
            .await??)
    }

    pub async fn read_value(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self
            .request(|reply| HostRequest::ReadValue {
                path: path.to_string(),
                reply,
            })
            .await??)
    }

    /// Fire-and-forget: the write itself never fails from the host's view.
    pub async fn write_value(&self, path: &str, value: Vec<u8>) {
        self.send(HostRequest::WriteValue {
            path: path.to_string(),
            value,
        })
        .await
    }

    pub async fn start_notify(&self, path: &str) {
        self.send(HostRequest::StartNotify {
            path: path.to_string(),
        })
        .await
    }

    pub async fn stop_notify(&self, path: &str) {
        self.send(HostRequest::StopNotify {
            path: path.to_string(),
        })
        .await
    }
}

/// Single writer of the GATT object tree.
pub struct EventProcessor {
    app: GattApplication,
    requests: mpsc::Receiver<HostRequest>,
    pushes: mpsc::Receiver<Push>,
    jobs: async_channel::Sender<CommandJob>,
    changes: mpsc::UnboundedSender<ChangeNotification>,
    worker: JoinHandle<()>,
}

impl EventProcessor {
    /// Create the processor and spawn its command worker.
    ///
    /// Change notifications for the host are sent on `changes`.
    pub fn new(
        app: GattApplication,
        protocol: CommandProtocol,
        changes: mpsc::UnboundedSender<ChangeNotification>,
    ) -> (Self, HostHandle) {
        let (request_tx, requests) = mpsc::channel(32);
        let (push_tx, pushes) = mpsc::channel(32);
        let (jobs, job_rx) = async_channel::bounded(COMMAND_QUEUE_CAPACITY);

        let worker = tokio::spawn(run_worker(protocol, job_rx, push_tx));

        let processor = Self {
            app,
            requests,
            pushes,
            jobs,
            changes,
            worker,
        };
        (processor, HostHandle { tx: request_tx })
    }

    /// Process host calls and command results until every [`HostHandle`] is
    /// dropped. Returns the final object tree.
    pub async fn run(mut self) -> GattApplication {
        info!("Event processor started");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(push) = self.pushes.recv() => self.handle_push(push),
            }
        }

        self.jobs.close();
        if let Err(e) = self.worker.await {
            warn!("Command worker ended abnormally: {}", e);
        }
        info!("Event processor stopped");
        self.app
    }

    fn handle_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::GetManagedObjects { reply } => {
                let _ = reply.send(self.app.managed_objects());
            }
            HostRequest::Get {
                path,
                interface,
                property,
                reply,
            } => {
                let _ = reply.send(self.app.get(&path, &interface, &property));
            }
            HostRequest::GetAll {
                path,
                interface,
                reply,
            } => {
                let _ = reply.send(self.app.get_all(&path, &interface));
            }
            HostRequest::ReadValue { path, reply } => {
                let _ = reply.send(self.app.read_value(&path));
            }
            HostRequest::WriteValue { path, value } => self.handle_write(&path, value),
            HostRequest::StartNotify { path } => {
                if let Err(e) = self.app.start_notify(&path) {
                    warn!("StartNotify failed: {}", e);
                }
            }
            HostRequest::StopNotify { path } => {
                if let Err(e) = self.app.stop_notify(&path) {
                    warn!("StopNotify failed: {}", e);
                }
            }
        }
    }

    /// Store the value first, then try to interpret it as a command.
    fn handle_write(&mut self, path: &str, value: Vec<u8>) {
        let service = match self.app.write_value(path, value.clone()) {
            Ok(service) => service,
            Err(e) => {
                warn!("WriteValue failed: {}", e);
                return;
            }
        };
        self.dispatch(service, &value);
    }

    fn dispatch(&self, service: ServiceId, value: &[u8]) {
        let command = match Command::decode(value) {
            Ok(command) => command,
            Err(e) => {
                warn!("❌ Ignoring write: {}", e);
                debug!("📥 WriteValue (raw): {:?}", value);
                return;
            }
        };

        info!("📥 Command received: {:?}", command);
        match self.jobs.try_send(CommandJob { service, command }) {
            Ok(()) => {}
            Err(async_channel::TrySendError::Full(_)) => {
                warn!("⏳ Command worker busy, dropping command");
            }
            Err(async_channel::TrySendError::Closed(_)) => {
                warn!("Command worker stopped, dropping command");
            }
        }
    }

    fn handle_push(&mut self, push: Push) {
        match self.app.push(push.service, push.bytes) {
            Ok(PushOutcome::Notified(change)) => {
                let len = change.value().map_or(0, <[u8]>::len);
                debug!("🔹 Notifying {} bytes on {}", len, change.path);
                if self.changes.send(change).is_err() {
                    debug!("No host bridge listening for changes");
                }
            }
            Ok(PushOutcome::NotSubscribed) => {}
            Err(e) => warn!("Push failed: {}", e),
        }
    }
}
