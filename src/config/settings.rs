use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for both the WebSocket server and the hub.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
}

/// Configuration settings for the server.
///
/// Defines where the server binds, which path accepts upgrades, and the
/// single origin allowed to connect (any origin when unset).
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub allowed_origin: Option<String>,
}

/// Configuration settings for the hub.
///
/// Controls queue capacities and the liveness probe of every session.
#[derive(Debug, Deserialize, Clone)]
pub struct HubSettings {
    pub outbound_capacity: usize,
    pub broadcast_capacity: usize,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl HubSettings {
    pub fn liveness(&self) -> Liveness {
        Liveness {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs.max(1)),
        }
    }
}

/// Liveness probe timing for a session's outbound pump.
///
/// A ping is sent every `ping_interval` (a zero interval disables probing and
/// leaves liveness to the transport); the session is dropped once a ping has
/// gone unanswered for `pong_timeout`, or when a single frame takes longer
/// than `write_timeout` to go out. Any frame from the peer answers every ping
/// sent before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
}

/// Partial server settings.
#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub allowed_origin: Option<String>,
}

/// Partial hub settings.
#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub outbound_capacity: Option<usize>,
    pub broadcast_capacity: Option<usize>,
    pub ping_interval_secs: Option<u64>,
    pub pong_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 40080,
                path: "/chat".to_string(),
                allowed_origin: None,
            },
            hub: HubSettings {
                outbound_capacity: 256,
                broadcast_capacity: 1024,
                ping_interval_secs: 54,
                pong_timeout_secs: 60,
                write_timeout_secs: 10,
            },
        }
    }
}
