//! WebSocket transport
//!
//! Accepts TCP connections, performs the WebSocket upgrade under the
//! [`HandshakePolicy`], and starts a [`ClientSession`] for each connection
//! that passes. Every connection is handled on its own task so a slow
//! handshake never holds up the accept loop. Handshake failures are logged
//! and never reach the hub.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tracing::{info, warn};
use tungstenite::handshake::server::{Request, Response};

use crate::client::ClientSession;
use crate::config::{Liveness, Settings};
use crate::hub::HubHandle;
use crate::transport::handshake::HandshakePolicy;
use crate::utils::error::RelayError;

/// Bind the configured address and serve connections forever.
pub async fn start_websocket_server(hub: HubHandle, settings: Settings) -> Result<(), RelayError> {
    let addr = settings.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!("WebSocket server listening on ws://{addr}{}", settings.server.path);

    serve(listener, hub, settings).await;
    Ok(())
}

/// Accept connections from an already bound listener. Never returns; accept
/// errors are logged and the loop carries on.
pub async fn serve(listener: TcpListener, hub: HubHandle, settings: Settings) {
    let policy = Arc::new(HandshakePolicy::new(&settings.server));
    let liveness = settings.hub.liveness();

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(
                    stream,
                    peer,
                    hub.clone(),
                    Arc::clone(&policy),
                    liveness,
                ));
            }
            Err(err) => warn!(error = %err, "failed to accept connection"),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    policy: Arc<HandshakePolicy>,
    liveness: Liveness,
) {
    let callback = |request: &Request, response: Response| policy.check(request, response);
    let ws = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, error = %err, "WebSocket handshake error");
            return;
        }
    };

    match ClientSession::start(&hub, ws, liveness).await {
        Ok(session) => info!(%peer, session = session.id, "client connected"),
        Err(err) => warn!(%peer, error = %err, "could not register client"),
    }
}
