use crate::ws::outbound::Outbound;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Opaque ID of one connection, used to correlate log lines
pub type SessionId = String;

/// An introduced connection and the queue that reaches it
#[derive(Debug, Clone)]
pub struct Participant {
    pub name: String,
    pub session_id: SessionId,
    pub outbound: Outbound,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("name {0} is already present")]
    AlreadyPresent(String),
}

/// Table of everyone currently in the chat, keyed by display name.
///
/// All access goes through one lock: mutation takes the write half,
/// snapshots take the read half.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    participants: Arc<RwLock<HashMap<String, Participant>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `participant` under its name unless the name is taken.
    /// The check and the insert happen under the same write guard.
    pub async fn register(&self, participant: Participant) -> Result<(), RegistryError> {
        let mut participants = self.participants.write().await;
        match participants.entry(participant.name.clone()) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyPresent(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(
                    user_name = %participant.name,
                    session_id = %participant.session_id,
                    "Participant registered"
                );
                entry.insert(participant);
                Ok(())
            }
        }
    }

    /// Remove `name`. Returns the removed entry, or `None` if it was absent.
    pub async fn unregister(&self, name: &str) -> Option<Participant> {
        let removed = self.participants.write().await.remove(name);
        if let Some(ref participant) = removed {
            tracing::debug!(
                user_name = %participant.name,
                session_id = %participant.session_id,
                "Participant unregistered"
            );
        }
        removed
    }

    /// Everyone except `name`, with the queue to reach them
    pub async fn snapshot_except(&self, name: &str) -> Vec<(String, Outbound)> {
        self.participants
            .read()
            .await
            .values()
            .filter(|p| p.name != name)
            .map(|p| (p.name.clone(), p.outbound.clone()))
            .collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.participants.read().await.contains_key(name)
    }

    pub async fn get(&self, name: &str) -> Option<Participant> {
        self.participants.read().await.get(name).cloned()
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.participants.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.participants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.participants.read().await.is_empty()
    }
}
