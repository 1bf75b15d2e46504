//! Real-time tracker events
//!
//! The tracker and scheduler publish [`TrackerEvent`]s to an [`EventHub`].
//! Clients connect to `/ws?user_id=<id>` and receive their own events as
//! JSON `{"type": "event", "event": {...}}` frames; `{"type": "ping"}` is
//! answered with a pong.

mod handler;
mod hub;
mod messages;

pub use handler::{websocket_handler, WsParams};
pub use hub::{ConnectionId, EventHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage, TrackerEvent};
