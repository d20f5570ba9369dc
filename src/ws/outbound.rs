//! Per-connection outbound queue
//!
//! Every frame bound for a connection (direct replies, broadcast fan-out,
//! heartbeat pings, close frames) is pushed into one bounded queue. A single
//! writer task drains it into the socket, so a connection never has two
//! writes in flight.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use futures::{Sink, SinkExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Why a frame could not be handed to a participant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    QueueFull,

    #[error("connection is closed")]
    Closed,
}

/// Cloneable handle that enqueues frames for one connection
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
}

impl Outbound {
    /// Create a queue of `capacity` frames. The receiver goes to the writer.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. A slow peer fills its own queue and starts
    /// dropping frames instead of stalling the caller.
    pub fn try_send(&self, msg: Message) -> Result<(), DeliveryError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn send_text(&self, text: Utf8Bytes) -> Result<(), DeliveryError> {
        self.try_send(Message::Text(text))
    }

    pub fn send_close(&self, code: u16, reason: &'static str) -> Result<(), DeliveryError> {
        self.try_send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task for a connection.
///
/// The task ends when the queue is closed and drained, when a write fails,
/// when a single write takes longer than `send_timeout`, or right after a
/// close frame has been written. Closing the sink is bounded by the same
/// timeout, so a half-open peer cannot keep the task alive.
pub fn spawn_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Message>,
    send_timeout: Duration,
) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display + Send,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            match tokio::time::timeout(send_timeout, sink.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket write failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(timeout = ?send_timeout, "WebSocket write timed out");
                    break;
                }
            }
            if is_close {
                break;
            }
        }
        // Further enqueues fail fast with DeliveryError::Closed
        rx.close();
        if tokio::time::timeout(send_timeout, sink.close()).await.is_err() {
            tracing::debug!(timeout = ?send_timeout, "WebSocket close timed out");
        }
    })
}
