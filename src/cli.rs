use clap::Parser;
use doc_crawler::CrawlConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "doc-crawl")]
#[command(about = "Fetch documentation pages and merge their main content into one Markdown file")]
#[command(version)]
pub struct Cli {
    /// Page to fetch (repeatable). Replaces the built-in page list.
    #[arg(short, long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Output Markdown file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// JSON file with crawl settings; flags given here take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// CSS selector of the content region
    #[arg(long, value_name = "SELECTOR")]
    pub content_selector: Option<String>,

    /// CSS selector of the page title
    #[arg(long, value_name = "SELECTOR")]
    pub title_selector: Option<String>,

    /// Honor robots.txt
    #[arg(long)]
    pub obey_robots: bool,

    /// Maximum requests in flight
    #[arg(long, value_name = "N")]
    pub concurrent_requests: Option<usize>,

    /// Maximum requests in flight per domain
    #[arg(long, value_name = "N")]
    pub concurrent_requests_per_domain: Option<usize>,

    /// Minimum delay between dispatches, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub download_delay: Option<f64>,

    /// Disable latency-based adaptive throttling
    #[arg(long)]
    pub no_autothrottle: bool,

    /// Cache responses in memory for the run
    #[arg(long)]
    pub http_cache: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Applies flags that were given on top of `config`.
    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if !self.urls.is_empty() {
            config.urls = self.urls.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(selector) = &self.content_selector {
            config.content_selector = selector.clone();
        }
        if let Some(selector) = &self.title_selector {
            config.title_selector = selector.clone();
        }
        if self.obey_robots {
            config.obey_robots = true;
        }
        if let Some(n) = self.concurrent_requests {
            config.concurrent_requests = n;
        }
        if let Some(n) = self.concurrent_requests_per_domain {
            config.concurrent_requests_per_domain = n;
        }
        if let Some(delay) = self.download_delay {
            config.download_delay_secs = delay;
        }
        if self.no_autothrottle {
            config.autothrottle.enabled = false;
        }
        if self.http_cache {
            config.http_cache_enabled = true;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_keeps_config() {
        let cli = Cli::parse_from(["doc-crawl"]);
        assert_eq!(cli.apply(CrawlConfig::default()), CrawlConfig::default());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "doc-crawl",
            "--url",
            "https://example.com/a.html",
            "-u",
            "https://example.com/b.html",
            "--output",
            "out.md",
            "--obey-robots",
            "--download-delay",
            "2.5",
            "--no-autothrottle",
            "--concurrent-requests",
            "4",
        ]);
        let config = cli.apply(CrawlConfig::default());

        assert_eq!(
            config.urls,
            vec![
                "https://example.com/a.html".to_string(),
                "https://example.com/b.html".to_string()
            ]
        );
        assert_eq!(config.output_path, PathBuf::from("out.md"));
        assert!(config.obey_robots);
        assert_eq!(config.download_delay_secs, 2.5);
        assert!(!config.autothrottle.enabled);
        assert_eq!(config.concurrent_requests, 4);
        assert_eq!(config.concurrent_requests_per_domain, 8);
    }
}
