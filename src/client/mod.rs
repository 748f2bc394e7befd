//! The `client` module defines the per-connection side of the relay.
//!
//! A [`ClientSession`] pairs one negotiated WebSocket with an outbound queue
//! registered in the hub, and drives it with two concurrent pumps: one
//! forwarding inbound frames to the hub, one writing hub output (and liveness
//! probes) back to the peer.

pub mod session;
pub use session::ClientSession;
