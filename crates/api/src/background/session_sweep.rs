//! Periodic deletion of expired sessions.
//!
//! Off by default: expired rows stay visible in `GET /session/list` until
//! closed. Enabled by setting `SWEEP_INTERVAL_SECS`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use peercode_core::registry::SessionRegistry;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(registry: Arc<SessionRegistry>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Session sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match registry.sweep_expired(Utc::now()).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Session sweep: purged expired sessions");
                    }
                    Ok(_) => {
                        tracing::debug!("Session sweep: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Session sweep failed");
                    }
                }
            }
        }
    }
}
