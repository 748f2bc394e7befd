use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay", author, version, about, long_about = None)]
pub struct Cli {
    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the WebSocket relay server.
    Server,
    /// Connect to a relay and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// WebSocket URL of the relay.
    #[arg(long, default_value = "ws://127.0.0.1:40080/chat")]
    pub url: String,

    /// Origin header to send, for relays that only accept one origin.
    #[arg(long)]
    pub origin: Option<String>,
}
