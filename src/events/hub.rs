//! Event hub
//!
//! A tokio broadcast channel carries every [`TrackerEvent`]. Each WebSocket
//! connection holds its own receiver and keeps only its user's events.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::messages::TrackerEvent;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Configuration for the event hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Capacity of the broadcast channel
    pub broadcast_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            broadcast_capacity: 1024,
        }
    }
}

/// Fan-out point for tracker events
pub struct EventHub {
    tx: broadcast::Sender<TrackerEvent>,
    /// Active connections: ConnectionId → user id
    connections: RwLock<HashMap<ConnectionId, String>>,
    config: HubConfig,
}

impl EventHub {
    pub fn new(config: HubConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            tx,
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Publish an event; returns how many receivers saw it
    pub fn publish(&self, event: TrackerEvent) -> usize {
        tracing::trace!(user_id = %event.user_id(), "Publishing event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    /// Register a connection for `user_id`
    pub async fn register(&self, user_id: &str) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(id.clone(), user_id.to_string());

        tracing::info!(connection_id = %id, user_id, "WebSocket connected");
        Ok(id)
    }

    pub async fn unregister(&self, id: &str) {
        self.connections.write().await.remove(id);
        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections currently open for one user
    pub async fn user_connection_count(&self, user_id: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|u| u.as_str() == user_id)
            .count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Errors that can occur in the event hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),
}
