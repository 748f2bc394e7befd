//! The `transport` module is responsible for accepting WebSocket
//! connections and handing them to the hub.
//!
//! It applies the handshake policy (upgrade path and the single origin
//! check), then starts a client session for every connection that passes.
//! No framing beyond "one WebSocket message is one payload" happens here.

pub mod handshake;
pub mod websocket;

pub use handshake::HandshakePolicy;
pub use websocket::{serve, start_websocket_server};
