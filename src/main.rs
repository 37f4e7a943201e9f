use anyhow::Result;
use clap::Parser;
use video_splitter::{cli::Cli, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
