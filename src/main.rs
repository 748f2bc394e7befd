//! CLI for Relay
//!
//! Subcommands:
//! - `server`: run the WebSocket relay
//! - `client`: chat with a running relay from the terminal (useful for smoke tests)

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use relay::cli::{Cli, Command};
use relay::config::load_config;
use relay::console;
use relay::hub::Hub;
use relay::transport::start_websocket_server;
use relay::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Command::Server => run_server().await,
        Command::Client(args) => console::run(args).await,
    }
}

async fn run_server() -> Result<()> {
    let settings = load_config()?;

    // The hub must be running before the first connection registers.
    let (hub, handle) = Hub::new(&settings.hub);
    tokio::spawn(hub.run());

    tokio::select! {
        result = start_websocket_server(handle, settings) => {
            if let Err(e) = &result {
                error!("Server failed: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting.");
        }
    }

    Ok(())
}
