//! Error types for the relay.
//!
//! `RelayError` covers failures surfaced to callers (startup, registration,
//! handshakes). `Disconnect` is not a failure of the relay itself: it records
//! why a single session ended so the pumps can decide how loudly to log it.
//! A disconnect is never reported to any other client.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tungstenite::Error as WsError;
use tungstenite::error::ProtocolError;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("hub is no longer running")]
    HubUnavailable,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Why a client session ended.
#[derive(Debug, Error)]
pub enum Disconnect {
    /// The peer sent a close frame.
    #[error("peer closed the connection")]
    Closed(Option<CloseFrame>),

    /// The stream ended without a close frame.
    #[error("connection ended")]
    Hangup,

    #[error("receive failed: {0}")]
    ReceiveFailed(WsError),

    #[error("send failed: {0}")]
    SendFailed(WsError),

    /// Nothing was heard from the peer within the pong timeout.
    #[error("no frame received for {0:?}")]
    LivenessTimeout(Duration),

    /// A single frame could not be written within the write timeout.
    #[error("send did not complete within {0:?}")]
    WriteTimeout(Duration),

    /// The hub dropped the session's outbound queue after removing it.
    #[error("released by hub")]
    Released,

    /// The hub evicted the session for falling behind on its outbound queue.
    #[error("evicted: outbound queue overflowed")]
    Evicted,

    /// The sibling pump of the same session finished first.
    #[error("sibling pump finished")]
    SiblingFinished,

    #[error("hub is no longer running")]
    HubUnavailable,
}

impl Disconnect {
    /// Expected disconnects are routine (tab closed, client navigated away)
    /// and are not worth an operator's attention.
    pub fn is_expected(&self) -> bool {
        match self {
            Disconnect::Closed(None) => true,
            Disconnect::Closed(Some(frame)) => is_expected_close_code(frame.code),
            Disconnect::Hangup | Disconnect::Released | Disconnect::SiblingFinished => true,
            Disconnect::ReceiveFailed(err) | Disconnect::SendFailed(err) => {
                is_expected_ws_error(err)
            }
            Disconnect::LivenessTimeout(_)
            | Disconnect::WriteTimeout(_)
            | Disconnect::Evicted
            | Disconnect::HubUnavailable => false,
        }
    }
}

fn is_expected_close_code(code: CloseCode) -> bool {
    matches!(
        code,
        CloseCode::Normal | CloseCode::Away | CloseCode::Abnormal
    )
}

fn is_expected_ws_error(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
