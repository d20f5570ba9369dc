//! Dead-peer detection via WebSocket ping/pong

use crate::ws::outbound::{DeliveryError, Outbound};
use axum::body::Bytes;
use axum::extract::ws::Message;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Ping the peer every `ping_interval` and fire `dead` if a ping goes
/// unanswered for `pong_timeout` or can no longer be queued. Pongs arrive
/// on `pongs`, forwarded by the connection's reader.
pub fn spawn(
    outbound: Outbound,
    mut pongs: mpsc::UnboundedReceiver<()>,
    dead: oneshot::Sender<()>,
    ping_interval: Duration,
    pong_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            // Unsolicited pongs don't count for this round
            while pongs.try_recv().is_ok() {}

            match outbound.try_send(Message::Ping(Bytes::from_static(b"ping"))) {
                Ok(()) => {}
                Err(DeliveryError::QueueFull) => {
                    tracing::debug!("Outbound queue full, skipping ping");
                    continue;
                }
                // Writer is gone, the peer can no longer be reached
                Err(DeliveryError::Closed) => {
                    let _ = dead.send(());
                    return;
                }
            }

            match timeout(pong_timeout, pongs.recv()).await {
                Ok(Some(())) => {}
                // Reader is gone, nothing left to watch
                Ok(None) => return,
                Err(_) => {
                    tracing::warn!(timeout = ?pong_timeout, "Pong timeout");
                    let _ = dead.send(());
                    return;
                }
            }
        }
    })
}
