use anyhow::Context;
use clap::Parser;
use i94_processor::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).await.context("i94-processor failed")
}
