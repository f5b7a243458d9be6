//! Omni CLI binary entry point.

use clap::Parser;
use omni::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Chat(args) => omni::cli::chat::handle_chat(args).await,
        Commands::Tools(args) => omni::cli::chat::handle_tools(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omni=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
