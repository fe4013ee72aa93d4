use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedctl::cli::{commands, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    commands::invoke(&cli).await?;

    Ok(())
}
