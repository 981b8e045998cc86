//! Heartbeat sender
//!
//! A background task that announces this instance to an AUTOMAT registry
//! on a fixed cadence. Delivery failures are logged and never terminate
//! the task; it runs until the process shuts down.

use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

const SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// The liveness announcement AUTOMAT expects
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatPayload {
    pub host: String,
    pub port: u16,
    pub tag: String,
}

/// Spawn the heartbeat loop. POSTs `payload` to `{automat_host}/heartbeat`
/// every `heart_rate` with a short per-send timeout.
pub fn spawn_heartbeat(
    automat_host: String,
    payload: HeartbeatPayload,
    heart_rate: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(SEND_TIMEOUT).build() {
            Ok(client) => client,
            Err(err) => {
                error!(%err, "could not build heartbeat client, heartbeats disabled");
                return;
            }
        };
        let url = format!("{}/heartbeat", automat_host.trim_end_matches('/'));
        let mut ticker = tokio::time::interval(heart_rate);
        loop {
            ticker.tick().await;
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(tag = %payload.tag, "heartbeat delivered");
                }
                Ok(response) => {
                    warn!(tag = %payload.tag, status = %response.status(), "heartbeat rejected");
                }
                Err(err) => {
                    warn!(tag = %payload.tag, %err, "heartbeat delivery failed");
                }
            }
        }
    })
}
