use crate::error::{DocCrawlerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TARGET_URLS: [&str; 5] = [
    "https://voiceover.manim.community/en/latest/installation.html",
    "https://voiceover.manim.community/en/latest/quickstart.html",
    "https://voiceover.manim.community/en/latest/services.html",
    "https://voiceover.manim.community/en/latest/translate.html",
    "https://voiceover.manim.community/en/latest/api.html",
];

pub const DEFAULT_OUTPUT_FILE: &str = "manim_voiceover_docs.md";
pub const DEFAULT_CONTENT_SELECTOR: &str = "div#furo-main-content";
pub const DEFAULT_TITLE_SELECTOR: &str = "h1";
pub const UNTITLED_PAGE: &str = "Untitled Page";
pub const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// Upper bound for any configured delay.
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);
/// Smallest AutoThrottle target concurrency accepted.
pub const MIN_TARGET_CONCURRENCY: f64 = 0.01;

/// One fetch result as handed over by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }
}

/// The content region and heading pulled out of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFragment {
    pub title: Option<String>,
    pub content_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownEntry {
    pub url: String,
    pub title: String,
    pub markdown: String,
}

impl MarkdownEntry {
    /// Header line followed by the converted body.
    pub fn render(&self) -> String {
        format!("# {}\n\n{}", self.title, self.markdown)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoThrottleConfig {
    pub enabled: bool,
    pub start_delay_secs: f64,
    pub max_delay_secs: f64,
    /// Average number of requests that should be in flight per origin.
    pub target_concurrency: f64,
}

impl Default for AutoThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_secs: 1.0,
            max_delay_secs: 60.0,
            target_concurrency: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlConfig {
    pub urls: Vec<String>,
    pub output_path: PathBuf,
    pub content_selector: String,
    pub title_selector: String,
    pub obey_robots: bool,
    pub concurrent_requests: usize,
    pub concurrent_requests_per_domain: usize,
    pub download_delay_secs: f64,
    pub autothrottle: AutoThrottleConfig,
    pub http_cache_enabled: bool,
    pub cookies_enabled: bool,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
    pub log_level: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_TARGET_URLS.iter().map(|u| u.to_string()).collect(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            content_selector: DEFAULT_CONTENT_SELECTOR.to_string(),
            title_selector: DEFAULT_TITLE_SELECTOR.to_string(),
            obey_robots: false,
            concurrent_requests: 16,
            concurrent_requests_per_domain: 8,
            download_delay_secs: 0.5,
            autothrottle: AutoThrottleConfig::default(),
            http_cache_enabled: false,
            cookies_enabled: false,
            request_timeout_secs: Some(30),
            user_agent: format!("doc-crawler/{}", env!("CARGO_PKG_VERSION")),
            log_level: "debug".to_string(),
        }
    }
}

impl CrawlConfig {
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocCrawlerError::ConfigFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|e| DocCrawlerError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Configured download delay. Values `validate` would reject read as zero.
    pub fn download_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.download_delay_secs)
            .unwrap_or_default()
            .min(MAX_DELAY)
    }

    pub fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(DocCrawlerError::Config {
                reason: "At least one target URL is required".to_string(),
            });
        }

        for url in &self.urls {
            Url::parse(url)?;
        }

        if self.concurrent_requests == 0 || self.concurrent_requests_per_domain == 0 {
            return Err(DocCrawlerError::Config {
                reason: "Concurrency limits must be greater than 0".to_string(),
            });
        }

        let delays = [
            ("download_delay_secs", self.download_delay_secs),
            ("autothrottle.start_delay_secs", self.autothrottle.start_delay_secs),
            ("autothrottle.max_delay_secs", self.autothrottle.max_delay_secs),
        ];
        for (name, value) in delays {
            let delay = Duration::try_from_secs_f64(value).map_err(|e| DocCrawlerError::Config {
                reason: format!("{} must be a non-negative number, got {}: {}", name, value, e),
            })?;
            if delay > MAX_DELAY {
                return Err(DocCrawlerError::Config {
                    reason: format!(
                        "{} must be at most {} seconds, got {}",
                        name,
                        MAX_DELAY.as_secs(),
                        value
                    ),
                });
            }
        }

        let target = self.autothrottle.target_concurrency;
        if !target.is_finite() || target < MIN_TARGET_CONCURRENCY {
            return Err(DocCrawlerError::Config {
                reason: format!(
                    "autothrottle.target_concurrency must be at least {}, got {}",
                    MIN_TARGET_CONCURRENCY, target
                ),
            });
        }

        Ok(())
    }
}

/// Counters reported when the run closes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_attempted: usize,
    pub pages_saved: usize,
    pub http_failures: usize,
    pub fetch_failures: usize,
    pub robots_skipped: usize,
    pub empty_content: usize,
    pub conversion_failures: usize,
    pub untitled_pages: usize,
    pub output_path: PathBuf,
    pub output_written: bool,
}

impl RunSummary {
    pub fn pages_skipped(&self) -> usize {
        self.http_failures
            + self.fetch_failures
            + self.robots_skipped
            + self.empty_content
            + self.conversion_failures
    }
}
