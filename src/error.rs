use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a Markdown converter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConversionError(pub String);

#[derive(Error, Debug)]
pub enum DocCrawlerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to retrieve {url} with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("No main content found for {url}")]
    ContentNotFound { url: String },

    #[error("Main content is empty for {url}")]
    EmptyContent { url: String },

    #[error("Error converting HTML to Markdown for {url}: {source}")]
    Conversion {
        url: String,
        #[source]
        source: ConversionError,
    },

    #[error("Converted Markdown is empty for {url}")]
    EmptyMarkdown { url: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Failed to load config file {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    #[error("Error writing to file {}: {source}", path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DocCrawlerError>;
