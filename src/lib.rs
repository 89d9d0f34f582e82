//! # Doc Crawler Library
//!
//! Fetches a fixed set of documentation pages, pulls the main content region out of
//! each one, converts it to Markdown and writes all pages into a single file separated
//! by horizontal rules.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use doc_crawler::{CrawlConfig, DocExtractionPipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = DocExtractionPipeline::new(CrawlConfig::default())?;
//!     let summary = pipeline.run().await;
//!
//!     println!("Saved {} pages to {}", summary.pages_saved, summary.output_path.display());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod services;
pub mod types;

pub use error::{ConversionError, DocCrawlerError, Result};
pub use pipeline::DocExtractionPipeline;
pub use services::{
    AutoThrottle, ContentExtractor, ContentFetcher, Html2MdConverter, MarkdownConverter,
    OutputWriter, RobotsTxt,
};
pub use types::{
    AutoThrottleConfig, CrawlConfig, ExtractedFragment, MarkdownEntry, PageResponse, RunSummary,
    DEFAULT_OUTPUT_FILE, DEFAULT_TARGET_URLS, ENTRY_SEPARATOR, UNTITLED_PAGE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
