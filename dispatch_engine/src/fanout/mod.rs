//! Real-time fanout.
//!
//! The [`FanoutHub`] tracks live connections and their broadcast groups. It is transport-agnostic: a transport
//! registers a connection, drains the receiver it is handed and forwards the frames to its socket.
//! [`add_fanout_hook`] wires the hub to the engine's event hooks.
mod hooks;
mod hub;
mod protocol;

pub use hooks::{add_fanout_hook, route_event};
pub use hub::{ConnectionId, FanoutHub, GroupKey};
pub use protocol::{ClientMessage, ServerMessage};
