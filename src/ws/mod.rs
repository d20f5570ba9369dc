pub mod heartbeat;
pub mod outbound;
pub mod session;

use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::state::AppState;
use outbound::Outbound;
use session::{Session, SessionError};

/// Close code sent to peers dropped by the heartbeat
const CLOSE_GOING_AWAY: u16 = 1001;

/// WebSocket upgrade handler for `GET /ws/chat`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection request");
    ws.on_upgrade(move |socket| run_connection(socket, state))
}

/// Drive one connection until it closes.
///
/// The socket is split: a writer task owns the sending half and drains the
/// connection's outbound queue, a heartbeat task pings the peer, and this
/// task reads frames and feeds them to the session.
pub async fn run_connection<S, E>(socket: S, state: Arc<AppState>)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: Display + Send,
    E: Display + Send,
{
    let config = state.config.clone();
    let (sink, mut stream) = socket.split();

    let (outbound, rx) = Outbound::channel(config.outbound_capacity);
    let mut writer = outbound::spawn_writer(sink, rx, config.send_timeout);

    let (pong_tx, pong_rx) = mpsc::unbounded_channel();
    let (dead_tx, mut dead_rx) = oneshot::channel();
    let heartbeat = heartbeat::spawn(
        outbound.clone(),
        pong_rx,
        dead_tx,
        config.ping_interval,
        config.pong_timeout,
    );

    let mut session = Session::new(state.registry.clone(), outbound.clone());
    tracing::info!(session_id = %session.id(), "WebSocket connected");

    let mut writer_done = false;
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(session_id = %session.id(), "Received: {}", text.as_str());
                    if let Err(e) = session.handle_text(text.as_str()).await {
                        tracing::warn!(
                            session_id = %session.id(),
                            error = %e,
                            "Closing session"
                        );
                        if let Some((code, reason)) = e.close_frame() {
                            let _ = outbound.send_close(code, reason);
                        }
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(
                        session_id = %session.id(),
                        len = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = outbound.try_send(Message::Pong(data));
                }
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(
                        session_id = %session.id(),
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
                Some(Err(e)) => {
                    let e = SessionError::ChannelRead(e.to_string());
                    tracing::warn!(session_id = %session.id(), error = %e, "WebSocket error");
                    break;
                }
                None => {
                    tracing::info!(session_id = %session.id(), "WebSocket stream ended");
                    break;
                }
            },

            // A heartbeat that ended without a verdict leaves the peer
            // unmonitored, so both outcomes end the connection
            dead = &mut dead_rx => {
                if dead.is_ok() {
                    tracing::warn!(session_id = %session.id(), "Peer is unreachable");
                } else {
                    tracing::warn!(session_id = %session.id(), "Heartbeat stopped");
                }
                let _ = outbound.send_close(CLOSE_GOING_AWAY, "Pong timeout");
                break;
            }

            _ = &mut writer, if !writer_done => {
                tracing::debug!(session_id = %session.id(), "Writer stopped");
                writer_done = true;
                break;
            }
        }
    }

    heartbeat.abort();
    session.close().await;
    tracing::info!(session_id = %session.id(), "WebSocket connection closed");

    // Let the writer flush what is queued (e.g. a close frame) before giving up on it
    drop(session);
    drop(outbound);
    if !writer_done
        && tokio::time::timeout(config.send_timeout, &mut writer)
            .await
            .is_err()
    {
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::protocol::ChatMessage;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    /// A peer that sends one frame and then goes silent in both directions
    /// without closing the TCP connection
    struct HalfOpenSocket {
        first: Option<Message>,
    }

    impl Stream for HalfOpenSocket {
        type Item = Result<Message, std::io::Error>;

        fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            match self.get_mut().first.take() {
                Some(msg) => Poll::Ready(Some(Ok(msg))),
                None => Poll::Pending,
            }
        }
    }

    impl Sink<Message> for HalfOpenSocket {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_peer_is_unregistered() {
        let config = RelayConfig {
            send_timeout: Duration::from_secs(2),
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(2),
            ..RelayConfig::default()
        };
        let state = Arc::new(AppState::new(config));
        let intro = ChatMessage::introduction("alice", "hi").encode().unwrap();
        let socket = HalfOpenSocket {
            first: Some(Message::Text(intro)),
        };

        let connection = tokio::spawn(run_connection(socket, state.clone()));

        tokio::time::timeout(Duration::from_secs(60), connection)
            .await
            .expect("Connection task should finish")
            .unwrap();
        assert!(!state.registry.contains("alice").await);
        assert!(state.registry.is_empty().await);
    }
}
