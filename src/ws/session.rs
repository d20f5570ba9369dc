//! Per-connection chat session
//!
//! A session starts unintroduced. The first valid introduction registers the
//! participant and makes it active; from then on every message is relayed to
//! the other participants. Closing a session removes the participant and
//! tells everyone else it left.

use crate::broadcast::broadcast;
use crate::protocol::{normalize_name, ChatMessage};
use crate::state::registry::{Participant, Registry, RegistryError, SessionId};
use crate::ws::outbound::Outbound;

/// Close code for messages that break the chat protocol
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Close code for payloads that are not a chat message
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unintroduced,
    Active { name: String },
    Closed,
}

/// Reasons a session ends
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("message received before introduction")]
    NotIntroduced,

    #[error("already introduced as {0}")]
    AlreadyIntroduced(String),

    #[error("session is closed")]
    Closed,

    #[error("channel read failed: {0}")]
    ChannelRead(String),
}

impl SessionError {
    /// Close frame to send before hanging up, if the peer is still there
    pub fn close_frame(&self) -> Option<(u16, &'static str)> {
        match self {
            SessionError::Decode(_) => Some((CLOSE_INVALID_PAYLOAD, "Invalid message format")),
            SessionError::NotIntroduced => {
                Some((CLOSE_POLICY_VIOLATION, "Introduction required"))
            }
            SessionError::AlreadyIntroduced(_) => {
                Some((CLOSE_POLICY_VIOLATION, "Already introduced"))
            }
            SessionError::Closed | SessionError::ChannelRead(_) => None,
        }
    }
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    registry: Registry,
    outbound: Outbound,
}

impl Session {
    pub fn new(registry: Registry, outbound: Outbound) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            state: SessionState::Unintroduced,
            registry,
            outbound,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Registered name, once introduced
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { name } => Some(name),
            _ => None,
        }
    }

    /// Process one text frame. An error means the session must be closed.
    pub async fn handle_text(&mut self, text: &str) -> Result<(), SessionError> {
        let msg = ChatMessage::decode(text)?;
        self.handle_message(msg).await
    }

    pub async fn handle_message(&mut self, msg: ChatMessage) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Unintroduced if msg.first_message => {
                self.introduce(&msg.user_name).await;
                Ok(())
            }
            SessionState::Unintroduced => Err(SessionError::NotIntroduced),
            SessionState::Active { name } if msg.first_message => {
                Err(SessionError::AlreadyIntroduced(name.clone()))
            }
            SessionState::Active { name } => {
                if msg.user_name != *name {
                    tracing::debug!(
                        session_id = %self.id,
                        user_name = %name,
                        claimed = %msg.user_name,
                        "Message author differs from registered name"
                    );
                }
                // Relayed messages always carry the registered name, so nobody
                // can speak as another participant or as the server
                let relayed = ChatMessage {
                    user_name: name.clone(),
                    ..msg
                };
                broadcast(&self.registry, &relayed, name).await;
                Ok(())
            }
        }
    }

    async fn introduce(&mut self, requested: &str) {
        let Some(name) = normalize_name(requested) else {
            tracing::info!(session_id = %self.id, "Rejected invalid name {:?}", requested);
            self.reply(&ChatMessage::invalid_name());
            return;
        };

        let participant = Participant {
            name: name.clone(),
            session_id: self.id.clone(),
            outbound: self.outbound.clone(),
        };

        match self.registry.register(participant).await {
            Ok(()) => {
                tracing::info!(session_id = %self.id, user_name = %name, "Participant joined");
                self.reply(&ChatMessage::welcome(&name));
                broadcast(&self.registry, &ChatMessage::joined(&name), &name).await;
                self.state = SessionState::Active { name };
            }
            Err(RegistryError::AlreadyPresent(name)) => {
                tracing::info!(session_id = %self.id, user_name = %name, "Name already taken");
                self.reply(&ChatMessage::name_taken(&name));
            }
        }
    }

    /// Send a message to this session's own connection only
    fn reply(&self, msg: &ChatMessage) {
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Failed to encode reply");
                return;
            }
        };
        if let Err(e) = self.outbound.send_text(frame) {
            tracing::warn!(session_id = %self.id, error = %e, "Failed to send reply");
        }
    }

    /// Enter the terminal state. An active participant is removed from the
    /// registry and the others are told it left. Calling this again, or on a
    /// session that never joined, does nothing.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let SessionState::Active { name } = previous else {
            return;
        };

        if self.registry.unregister(&name).await.is_some() {
            tracing::info!(session_id = %self.id, user_name = %name, "Participant left");
            broadcast(&self.registry, &ChatMessage::left(&name), &name).await;
        }
    }
}
