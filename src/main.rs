use anyhow::Result;
use clap::Parser;

use solsplit::cli::{self, args::Cli, context};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = context::load_configuration(cli.config.clone())?;
    context::init_tracing(&config.global.logging)?;
    cli::run(cli, config).await
}
