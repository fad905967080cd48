use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod store;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG wins; otherwise log this crate and the library at info.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("glimpse=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => commands::serve::run(&args).await,
        Commands::Health(args) => commands::health::run(&args).await,
    }
}
