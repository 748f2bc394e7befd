mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{HubSettings, Liveness, ServerSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Environment keys look like `RELAY_SERVER__PORT` or `RELAY_HUB__OUTBOUND_CAPACITY`
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let hub = partial.hub;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            path: server
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.server.path),
            allowed_origin: server
                .as_ref()
                .and_then(|s| s.allowed_origin.clone())
                .or(default.server.allowed_origin),
        },
        hub: HubSettings {
            outbound_capacity: hub
                .as_ref()
                .and_then(|h| h.outbound_capacity)
                .unwrap_or(default.hub.outbound_capacity),
            broadcast_capacity: hub
                .as_ref()
                .and_then(|h| h.broadcast_capacity)
                .unwrap_or(default.hub.broadcast_capacity),
            ping_interval_secs: hub
                .as_ref()
                .and_then(|h| h.ping_interval_secs)
                .unwrap_or(default.hub.ping_interval_secs),
            pong_timeout_secs: hub
                .as_ref()
                .and_then(|h| h.pong_timeout_secs)
                .unwrap_or(default.hub.pong_timeout_secs),
            write_timeout_secs: hub
                .as_ref()
                .and_then(|h| h.write_timeout_secs)
                .unwrap_or(default.hub.write_timeout_secs),
        },
    }
}
