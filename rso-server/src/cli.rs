use std::path::PathBuf;

use clap::Parser;

/// CLI for the shared object server.
#[derive(Debug, Clone, Parser)]
#[command(name = "rso-server", about = "Remote shared object server over WebSocket")]
pub struct Cli {
    /// Listen address for HTTP/WS endpoints
    #[arg(long, env = "RSO_ADDR", default_value = "127.0.0.1:8788")]
    pub listen_addr: String,

    /// Optional YAML file with registry settings
    #[arg(long, env = "RSO_CONFIG")]
    pub config: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence options
    // ─────────────────────────────────────────────────────────────────────────

    /// Keep persistent shared objects as JSON files under this directory.
    /// Overrides the persistence section of --config.
    #[arg(long, env = "RSO_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}
