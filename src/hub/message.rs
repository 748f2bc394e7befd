//! Payload definitions for the hub
//!
//! A `Payload` is the body of one client message, relayed verbatim. The hub
//! never inspects it; the only thing preserved besides the bytes is whether
//! the peer sent it as a text or a binary frame, so it goes back out the
//! same way. Cloning is a reference-count bump, which keeps fan-out cheap.

use tungstenite::protocol::Message as WsMessage;
use tungstenite::{Bytes, Utf8Bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

impl Payload {
    /// Extract the payload of a data frame. Control frames carry none.
    pub fn from_ws(msg: WsMessage) -> Option<Self> {
        match msg {
            WsMessage::Text(text) => Some(Payload::Text(text)),
            WsMessage::Binary(bytes) => Some(Payload::Binary(bytes)),
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
                None
            }
        }
    }

    pub fn into_ws(self) -> WsMessage {
        match self {
            Payload::Text(text) => WsMessage::Text(text),
            Payload::Binary(bytes) => WsMessage::Binary(bytes),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.into())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes.into())
    }
}
