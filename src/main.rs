use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use trailclub::cli::{execute, Cli};
use trailclub::env_manager;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = env_manager::load_env_file() {
        eprintln!("Warning: could not prepare .env file: {}", e);
    }

    trailclub::init_logger();

    let cli = Cli::parse();
    debug!("Parsed arguments: {:?}", cli);
    info!("Starting trailclub {}", env!("CARGO_PKG_VERSION"));

    execute(cli).await
}
