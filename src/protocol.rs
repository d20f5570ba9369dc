use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

/// Name used for messages the relay itself authors
pub const SERVER_NAME: &str = "Server";

/// A chat message as it travels over the wire, in both directions.
///
/// `first_message` marks the introduction that carries the sender's display
/// name. It may be omitted by clients and is always written on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub first_message: bool,
}

impl ChatMessage {
    pub fn new(user_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            message: message.into(),
            first_message: false,
        }
    }

    pub fn introduction(user_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            first_message: true,
            ..Self::new(user_name, message)
        }
    }

    fn from_server(message: String) -> Self {
        Self::new(SERVER_NAME, message)
    }

    /// Private greeting sent to a participant right after it joins
    pub fn welcome(name: &str) -> Self {
        Self::from_server(format!("Welcome to the chat room, {}", name))
    }

    pub fn joined(name: &str) -> Self {
        Self::from_server(format!("{} just joined the chat, say hi :)", name))
    }

    pub fn left(name: &str) -> Self {
        Self::from_server(format!("{} exited the chat room :(", name))
    }

    pub fn name_taken(name: &str) -> Self {
        Self::from_server(format!(
            "The name {} is already taken, pick another one",
            name
        ))
    }

    pub fn invalid_name() -> Self {
        Self::from_server("Invalid name, pick another one".to_string())
    }

    pub fn is_from_server(&self) -> bool {
        self.user_name == SERVER_NAME
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode into a text frame payload. `Utf8Bytes` is reference counted, so
    /// one encoding can be handed to any number of recipients.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

/// Display names are trimmed before use; blank names and the server's own
/// name are refused.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name == SERVER_NAME {
        None
    } else {
        Some(name.to_string())
    }
}
