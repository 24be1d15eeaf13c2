#![recursion_limit = "256"]

use anyhow::Result;
use clap::Parser;
use trojan_lab::cli::Cli;

fn main() -> Result<()> {
    let cli   = Cli::parse();
    let level = if cli.verbose { "trojan_lab=debug" } else { "trojan_lab=info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse()?),
        )
        .init();

    cli.run()
}
