//! rso-server: hosts remote shared objects over WebSocket.

use anyhow::Result;
use clap::Parser;
use rso_server::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    rso_server::run_with_cli(Cli::parse()).await
}
