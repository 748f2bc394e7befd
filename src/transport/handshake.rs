//! Handshake policy
//!
//! Decides, during the HTTP upgrade, whether a connection may join the
//! relay at all. Two checks, nothing more:
//! - the request path must be the configured upgrade path
//! - when an allowed origin is configured, the `Origin` header must match it
//!   exactly (a missing header does not match)
//!
//! Anything beyond this (accounts, tokens) is out of scope for the relay.

use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::http::header::ORIGIN;

use crate::config::ServerSettings;

#[derive(Debug, Clone)]
pub struct HandshakePolicy {
    path: String,
    allowed_origin: Option<String>,
}

impl HandshakePolicy {
    pub fn new(server: &ServerSettings) -> Self {
        Self {
            path: server.path.clone(),
            allowed_origin: server.allowed_origin.clone(),
        }
    }

    /// Handshake callback: pass the response through untouched, or replace
    /// it with a rejection.
    pub fn check(&self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        if request.uri().path() != self.path {
            return Err(reject(StatusCode::NOT_FOUND, "unknown path"));
        }

        if let Some(allowed) = &self.allowed_origin {
            let origin = request
                .headers()
                .get(ORIGIN)
                .and_then(|value| value.to_str().ok());
            if origin != Some(allowed.as_str()) {
                return Err(reject(StatusCode::FORBIDDEN, "origin not allowed"));
            }
        }

        Ok(response)
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}
