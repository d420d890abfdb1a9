//! The real-time vendor channel.
//!
//! Vendors and customers hold a WebSocket open to the server. Vendors answer offers over it (accept, reject, progress
//! updates) and every party receives the notifications for the groups it belongs to.
//!
//! * [`context`] holds the shared objects every connection works with.
//! * [`handlers`] maps each [`dispatch_engine::fanout::ClientMessage`] to an engine call and a reply. It knows nothing
//!   about sockets and is tested without one.
//! * [`transport`] accepts connections, authenticates them and pumps frames between the socket and the handlers.
pub mod context;
pub mod handlers;
pub mod transport;

pub use context::{LiveContext, RealtimeContext};
pub use handlers::{handle_frame, handle_message, Session};
pub use transport::run_realtime_server;
