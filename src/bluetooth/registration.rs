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

//! Fire-and-forget registration with the host Bluetooth manager.
//!
//! Each registration runs on its own task and reports exactly one
//! [`RegistrationOutcome`] on a shared channel. On success the task keeps the
//! registration handle alive until shutdown; on failure it reports and exits.
//! Nothing is retried.

use std::fmt;
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// What is being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Application,
    Advertisement,
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "GATT application"),
            Self::Advertisement => write!(f, "advertisement"),
        }
    }
}

/// Reply or error of one registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub kind: RegistrationKind,
    pub result: Result<(), String>,
}

/// Run `register` in the background and report its outcome on `outcomes`.
///
/// The handle produced on success is held until `shutdown` flips to `true`
/// (or its sender is dropped), then dropped to unregister.
pub fn spawn_registration<H, E, F>(
    kind: RegistrationKind,
    register: F,
    outcomes: mpsc::UnboundedSender<RegistrationOutcome>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    H: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Future<Output = Result<H, E>> + Send + 'static,
{
    tokio::spawn(async move {
        info!("ℹ️ Registering {}...", kind);
        match register.await {
            Ok(handle) => {
                let _ = outcomes.send(RegistrationOutcome { kind, result: Ok(()) });
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                drop(handle);
                info!("{} unregistered", kind);
            }
            Err(e) => {
                let _ = outcomes.send(RegistrationOutcome {
                    kind,
                    result: Err(e.to_string()),
                });
            }
        }
    })
}

/// Consume outcomes and log them. Returns once every registration reported.
pub async fn log_outcomes(
    mut outcomes: mpsc::UnboundedReceiver<RegistrationOutcome>,
) -> Vec<RegistrationOutcome> {
    let mut seen = Vec::new();
    while let Some(outcome) = outcomes.recv().await {
        match &outcome.result {
            Ok(()) => match outcome.kind {
                RegistrationKind::Application => info!("✅ GATT application registered"),
                RegistrationKind::Advertisement => info!("📣 Advertisement registered"),
            },
            Err(e) => error!("❌ Failed to register {}: {}", outcome.kind, e),
        }
        seen.push(outcome);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_and_failure_each_report_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = spawn_registration(
            RegistrationKind::Application,
            async { Ok::<_, String>(()) },
            tx.clone(),
            shutdown_rx.clone(),
        );
        let adv = spawn_registration(
            RegistrationKind::Advertisement,
            async { Err::<(), _>("Maximum advertisements reached") },
            tx,
            shutdown_rx,
        );

        adv.await.unwrap();
        shutdown_tx.send(true).unwrap();
        app.await.unwrap();

        let outcomes = log_outcomes(rx).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.contains(&RegistrationOutcome {
            kind: RegistrationKind::Application,
            result: Ok(()),
        }));
        assert!(outcomes.contains(&RegistrationOutcome {
            kind: RegistrationKind::Advertisement,
            result: Err("Maximum advertisements reached".into()),
        }));
    }

    #[tokio::test]
    async fn test_handle_released_when_shutdown_sender_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = spawn_registration(
            RegistrationKind::Application,
            async { Ok::<_, String>(42u32) },
            tx,
            shutdown_rx,
        );

        assert_eq!(rx.recv().await.unwrap().result, Ok(()));
        drop(shutdown_tx);
        task.await.unwrap();
    }
}
