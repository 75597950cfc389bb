//! Directory of live viewers.
//!
//! Each registered connection owns the receiving half of a bounded channel;
//! the registry holds the only long-lived sender. Removing the entry drops
//! that sender, which ends the connection's writer once queued messages are
//! flushed.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::messages::ServerMessage;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsocketClient {
    pub remote_address: String,
    pub user_agent: Option<String>,
    /// Account whose updates this viewer receives.
    pub owner_id: String,
    pub connected_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl WebsocketClient {
    pub fn new(remote_address: String, user_agent: Option<String>, owner_id: String) -> Self {
        let now = Utc::now();
        Self {
            remote_address,
            user_agent,
            owner_id,
            connected_at: now,
            last_activity_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    NotConnected,
    /// The connection is gone or its queue is full.
    Undeliverable,
}

/// Outcome of a fan-out to one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

struct RegistryEntry {
    client: WebsocketClient,
    sender: mpsc::Sender<ServerMessage>,
}

#[derive(Default)]
pub struct ClientRegistry {
    entries: RwLock<HashMap<Uuid, RegistryEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        client: WebsocketClient,
    ) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        debug!(
            "Registering live client {} for {} from {}",
            id, client.owner_id, client.remote_address
        );
        self.entries
            .write()
            .await
            .insert(id, RegistryEntry { client, sender });
        (id, receiver)
    }

    /// Removes the connection and closes its channel. Returns false if it was
    /// already gone.
    pub async fn deregister(&self, id: &Uuid) -> bool {
        let removed = self.entries.write().await.remove(id);
        match removed {
            Some(entry) => {
                debug!("Deregistered live client {} for {}", id, entry.client.owner_id);
                true
            }
            None => false,
        }
    }

    pub async fn touch(&self, id: &Uuid) {
        if let Some(entry) = self.entries.write().await.get_mut(id) {
            entry.client.last_activity_at = Utc::now();
        }
    }

    pub async fn client(&self, id: &Uuid) -> Option<WebsocketClient> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.client.clone())
    }

    pub async fn channels_for_account(&self, account_id: &str) -> Vec<mpsc::Sender<ServerMessage>> {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.client.owner_id == account_id)
            .map(|entry| entry.sender.clone())
            .collect()
    }

    pub async fn count_for_account(&self, account_id: &str) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.client.owner_id == account_id)
            .count()
    }

    pub async fn total_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn send_to(&self, id: &Uuid, message: ServerMessage) -> Result<(), SendError> {
        let sender = self
            .entries
            .read()
            .await
            .get(id)
            .map(|entry| entry.sender.clone())
            .ok_or(SendError::NotConnected)?;
        sender
            .try_send(message)
            .map_err(|_| SendError::Undeliverable)
    }

    /// Queues `message` on every channel of the account without waiting on
    /// slow readers. Full or closed channels are counted as dropped.
    pub async fn notify_account(&self, account_id: &str, message: &ServerMessage) -> Delivery {
        let mut delivery = Delivery::default();
        for sender in self.channels_for_account(account_id).await {
            match sender.try_send(message.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => delivery.dropped += 1,
            }
        }
        delivery
    }
}
