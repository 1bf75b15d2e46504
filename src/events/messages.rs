//! Event and WebSocket message types

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerOutcome;

/// Something the tracker did that a connected client may want to show
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    EntryRecorded {
        user_id: String,
        entry_id: String,
        title: String,
        ledger: Option<LedgerOutcome>,
    },
    BadgeUnlocked {
        user_id: String,
        milestone: u32,
        name: String,
        icon: String,
        transaction_id: String,
        confirmed: bool,
    },
    /// A ledger write fell back to a local placeholder
    LedgerDegraded {
        user_id: String,
        operation: String,
        reason: String,
    },
    ReminderSent {
        user_id: String,
        days_inactive: i64,
    },
    DigestSent {
        user_id: String,
        entries_this_week: u32,
    },
}

impl TrackerEvent {
    pub fn user_id(&self) -> &str {
        match self {
            TrackerEvent::EntryRecorded { user_id, .. }
            | TrackerEvent::BadgeUnlocked { user_id, .. }
            | TrackerEvent::LedgerDegraded { user_id, .. }
            | TrackerEvent::ReminderSent { user_id, .. }
            | TrackerEvent::DigestSent { user_id, .. } => user_id,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected {
        connection_id: String,
        user_id: String,
    },
    /// A tracker event for this connection's user
    Event { event: TrackerEvent },
    /// Events were dropped because the client fell behind
    Lagged { skipped: u64 },
    Pong,
    Error { message: String },
}
