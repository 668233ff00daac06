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

//! RaspiBLE Wi-Fi provisioning peripheral

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raspible::bluetooth::registration;
use raspible::bluetooth::{Advertisement, GattApplication, GattServer};
use raspible::commands::CommandProtocol;
use raspible::config::Config;
use raspible::events::EventProcessor;
use raspible::wifi::{IwlistScanTool, NmcliConnectTool};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raspible=info".parse()?),
        )
        .init();

    info!("Starting RaspiBLE v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // Find the adapter before building anything else
    let mut gatt_server = GattServer::new(&config.bluetooth).await?;
    gatt_server.set_name(&config.bluetooth.local_name).await?;
    info!("Adapter address: {}", gatt_server.address().await?);

    // Object tree and command tools
    let app = GattApplication::provisioning(config.bluetooth.object_root.clone());
    let advertisement = Advertisement::new(
        &config.bluetooth.object_root,
        0,
        config.bluetooth.local_name.clone(),
    );
    let protocol = CommandProtocol::new(
        Arc::new(IwlistScanTool::from_config(&config.wifi)),
        Arc::new(NmcliConnectTool::from_config(&config.wifi)),
    );

    // Event processor owns the tree from here on
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let (processor, host) = EventProcessor::new(app, protocol, changes_tx);
    tokio::spawn(processor.run());

    // Register with BlueZ; outcomes are only logged
    let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
    tokio::spawn(registration::log_outcomes(outcomes_rx));
    gatt_server
        .start(&host, &advertisement, changes_rx, outcomes_tx)
        .await?;

    info!("Ready. Advertising as '{}'", config.bluetooth.local_name);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    gatt_server.stop().await;

    info!("RaspiBLE stopped");
    Ok(())
}
