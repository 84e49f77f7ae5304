use clap::Parser;
use tracing_subscriber::EnvFilter;

use rover_runtime::config::Cli;

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = rover_runtime::runtime::run(cli).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
