mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use doc_crawler::{CrawlConfig, DocExtractionPipeline};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => CrawlConfig::from_json_file(path).await?,
        None => CrawlConfig::default(),
    };
    let config = cli.apply(base);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("Invalid log level '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    debug!("Effective configuration: {:?}", config);

    let pipeline = DocExtractionPipeline::new(config)?;
    let summary = pipeline.run().await;

    info!(
        "Spider closed: {}",
        serde_json::to_string(&summary).context("Failed to serialize run summary")?
    );

    Ok(())
}
