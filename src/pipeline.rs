use crate::error::{DocCrawlerError, Result};
use crate::services::{
    ContentExtractor, ContentFetcher, Html2MdConverter, MarkdownConverter, OutputWriter,
};
use crate::types::{CrawlConfig, MarkdownEntry, PageResponse, RunSummary, UNTITLED_PAGE};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

type FetchOutcome = Result<PageResponse>;

/// Fetches the configured pages, extracts their documentation region as Markdown and
/// writes everything to one file once every fetch has resolved.
///
/// Entries accumulate in completion order, which under concurrent fetching need not
/// match the order of the URL list.
pub struct DocExtractionPipeline<C = Html2MdConverter> {
    config: CrawlConfig,
    fetcher: Arc<ContentFetcher>,
    extractor: ContentExtractor,
    converter: C,
    entries: Vec<MarkdownEntry>,
    summary: RunSummary,
}

impl DocExtractionPipeline<Html2MdConverter> {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        Self::with_converter(config, Html2MdConverter::default())
    }
}

impl<C: MarkdownConverter> DocExtractionPipeline<C> {
    pub fn with_converter(config: CrawlConfig, converter: C) -> Result<Self> {
        config.validate()?;

        let fetcher = Arc::new(ContentFetcher::new(&config)?);
        let extractor = ContentExtractor::new(&config.content_selector, &config.title_selector)?;
        let summary = RunSummary {
            output_path: config.output_path.clone(),
            ..Default::default()
        };

        Ok(Self {
            config,
            fetcher,
            extractor,
            converter,
            entries: Vec::new(),
            summary,
        })
    }

    pub fn entries(&self) -> &[MarkdownEntry] {
        &self.entries
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Dispatches every URL, processes responses as they arrive, then writes the output.
    ///
    /// Never fails: per-page problems and a failed write are logged and counted.
    pub async fn run(mut self) -> RunSummary {
        self.summary.started_at = Some(Utc::now());
        info!(
            "Starting crawl of {} URLs (concurrency {}/{} per domain, delay {:?}, robots.txt {})",
            self.config.urls.len(),
            self.config.concurrent_requests,
            self.config.concurrent_requests_per_domain,
            self.config.download_delay(),
            if self.config.obey_robots { "obeyed" } else { "ignored" }
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&self.fetcher),
            self.config.urls.clone(),
            tx,
        ));

        // Closes once the dispatcher and every fetch task have dropped their sender.
        while let Some(outcome) = rx.recv().await {
            self.handle_outcome(outcome);
        }

        if let Err(e) = dispatcher.await {
            error!("Dispatcher task failed: {}", e);
        }

        debug!("All fetches resolved, finalizing");
        self.finalize().await;
        self.summary.finished_at = Some(Utc::now());

        info!(
            "Crawl finished: {} of {} pages saved, {} skipped, output {}",
            self.summary.pages_saved,
            self.summary.pages_attempted,
            self.summary.pages_skipped(),
            if self.summary.output_written { "written" } else { "not written" }
        );
        self.summary
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        self.summary.pages_attempted += 1;

        if let Err(e) = outcome.and_then(|response| self.process_page(&response)) {
            self.record_skip(&e);
        }
    }

    /// Turns one response into a Markdown entry and appends it.
    ///
    /// Returns the reason the page was skipped; nothing is appended in that case.
    pub fn process_page(&mut self, response: &PageResponse) -> Result<()> {
        debug!("Parsing URL: {} with status {}", response.url, response.status);

        if response.status != 200 {
            return Err(DocCrawlerError::HttpStatus {
                url: response.url.clone(),
                status: response.status,
            });
        }

        let fragment = self.extractor.extract(response)?;

        let markdown = self
            .converter
            .convert(&fragment.content_html)
            .map_err(|source| DocCrawlerError::Conversion {
                url: response.url.clone(),
                source,
            })?;
        if markdown.trim().is_empty() {
            return Err(DocCrawlerError::EmptyMarkdown {
                url: response.url.clone(),
            });
        }

        let title = match fragment.title {
            Some(title) => title,
            None => {
                warn!("No title found for {}", response.url);
                self.summary.untitled_pages += 1;
                UNTITLED_PAGE.to_string()
            }
        };

        self.entries.push(MarkdownEntry {
            url: response.url.clone(),
            title,
            markdown,
        });
        self.summary.pages_saved += 1;
        debug!("Appended markdown for {}", response.url);

        Ok(())
    }

    fn record_skip(&mut self, error: &DocCrawlerError) {
        match error {
            DocCrawlerError::HttpStatus { .. } => {
                warn!("{}", error);
                self.summary.http_failures += 1;
            }
            DocCrawlerError::RobotsDisallowed { .. } => {
                warn!("{}", error);
                self.summary.robots_skipped += 1;
            }
            DocCrawlerError::ContentNotFound { .. }
            | DocCrawlerError::EmptyContent { .. }
            | DocCrawlerError::EmptyMarkdown { .. } => {
                warn!("{}", error);
                self.summary.empty_content += 1;
            }
            DocCrawlerError::Conversion { .. } => {
                error!("{}", error);
                self.summary.conversion_failures += 1;
            }
            _ => {
                error!("{}", error);
                self.summary.fetch_failures += 1;
            }
        }
    }

    /// Writes the accumulated entries, replacing any previous output.
    ///
    /// Runs even with zero entries. Returns whether the file was written.
    pub async fn finalize(&mut self) -> bool {
        let path = &self.config.output_path;

        match OutputWriter::write(path, &self.entries).await {
            Ok(()) => {
                info!(
                    "Markdown file with {} entries saved to {}",
                    self.entries.len(),
                    path.display()
                );
                self.summary.output_written = true;
            }
            Err(e) => {
                error!("{}", e);
                self.summary.output_written = false;
            }
        }

        self.summary.output_written
    }
}

async fn dispatch(
    fetcher: Arc<ContentFetcher>,
    urls: Vec<String>,
    tx: UnboundedSender<FetchOutcome>,
) {
    let mut last_dispatch: Option<Instant> = None;

    for url in urls {
        let parsed = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = tx.send(Err(e.into()));
                continue;
            }
        };

        if let Some(last) = last_dispatch {
            let delay = fetcher.dispatch_delay().await;
            tokio::time::sleep_until(last + delay).await;
        }

        let permit = match fetcher.acquire(&parsed).await {
            Ok(permit) => permit,
            Err(e) => {
                let _ = tx.send(Err(e));
                continue;
            }
        };
        last_dispatch = Some(Instant::now());
        debug!("Dispatching {}", url);

        let fetcher = Arc::clone(&fetcher);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = fetcher.fetch(&url).await;
            drop(permit);
            let _ = tx.send(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::types::{AutoThrottleConfig, ENTRY_SEPARATOR};
    use httpmock::{Method::GET, MockServer};
    use std::path::PathBuf;
    use std::time::Duration;

    struct FailingConverter;

    impl MarkdownConverter for FailingConverter {
        fn convert(&self, _html: &str) -> std::result::Result<String, ConversionError> {
            Err(ConversionError("unsupported markup".to_string()))
        }
    }

    /// Collects formatted log lines for assertions on diagnostics.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let logs = self.clone();
            tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_ansi(false)
                .with_target(false)
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn test_config(urls: Vec<String>, output_path: PathBuf) -> CrawlConfig {
        CrawlConfig {
            urls,
            output_path,
            download_delay_secs: 0.0,
            autothrottle: AutoThrottleConfig {
                enabled: false,
                ..Default::default()
            },
            request_timeout_secs: Some(5),
            ..Default::default()
        }
    }

    fn offline_pipeline(output_path: PathBuf) -> DocExtractionPipeline {
        DocExtractionPipeline::new(test_config(
            vec!["https://example.com/index.html".to_string()],
            output_path,
        ))
        .unwrap()
    }

    fn doc_page(url: &str, region: &str) -> PageResponse {
        PageResponse::new(
            url,
            200,
            format!(
                r#"<html><body><nav>Menu</nav><div id="furo-main-content">{}</div></body></html>"#,
                region
            ),
        )
    }

    #[test]
    fn test_non_200_adds_nothing() {
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = PageResponse::new("https://example.com/missing.html", 404, "not found");

        let result = pipeline.process_page(&response);

        assert!(matches!(
            result,
            Err(DocCrawlerError::HttpStatus { status: 404, .. })
        ));
        assert!(pipeline.entries().is_empty());
    }

    #[test]
    fn test_non_200_logs_url_and_status() {
        let logs = CapturedLogs::default();
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = PageResponse::new("https://example.com/missing.html", 404, "not found");

        tracing::subscriber::with_default(logs.subscriber(), || {
            pipeline.handle_outcome(Ok(response));
        });

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("WARN"))
            .unwrap_or_else(|| panic!("no warning logged: {}", output));
        assert!(line.contains("https://example.com/missing.html"), "got: {}", line);
        assert!(line.contains("404"), "got: {}", line);
        assert_eq!(pipeline.summary().http_failures, 1);
        assert!(pipeline.entries().is_empty());
    }

    #[test]
    fn test_blank_region_adds_nothing() {
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = doc_page("https://example.com/empty.html", "   ");

        let result = pipeline.process_page(&response);

        assert!(matches!(result, Err(DocCrawlerError::EmptyContent { .. })));
        assert!(pipeline.entries().is_empty());
    }

    #[test]
    fn test_missing_region_adds_nothing() {
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = PageResponse::new("https://example.com/a.html", 200, "<p>No region</p>");

        let result = pipeline.process_page(&response);

        assert!(matches!(result, Err(DocCrawlerError::ContentNotFound { .. })));
        assert!(pipeline.entries().is_empty());
    }

    #[test]
    fn test_conversion_failure_carries_detail() {
        let config = test_config(
            vec!["https://example.com/index.html".to_string()],
            PathBuf::from("unused.md"),
        );
        let mut pipeline = DocExtractionPipeline::with_converter(config, FailingConverter).unwrap();
        let response = doc_page("https://example.com/api.html", "<h1>API</h1><p>Body</p>");

        let error = pipeline.process_page(&response).unwrap_err();

        assert!(matches!(error, DocCrawlerError::Conversion { .. }));
        let message = error.to_string();
        assert!(message.contains("unsupported markup"), "got: {}", message);
        assert!(message.contains("https://example.com/api.html"));
        assert!(pipeline.entries().is_empty());
    }

    #[test]
    fn test_missing_title_uses_default() {
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = doc_page("https://example.com/notes.html", "<p>Some notes</p>");

        pipeline.process_page(&response).unwrap();

        let entries = pipeline.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, UNTITLED_PAGE);
        assert!(entries[0].render().starts_with("# Untitled Page\n\n"));
        assert_eq!(pipeline.summary().untitled_pages, 1);
    }

    #[test]
    fn test_entry_has_title_header_and_converted_body() {
        let mut pipeline = offline_pipeline(PathBuf::from("unused.md"));
        let response = doc_page(
            "https://example.com/quickstart.html",
            "<h1>Quickstart</h1><p>Render a <strong>scene</strong></p>",
        );

        pipeline.process_page(&response).unwrap();

        let entry = &pipeline.entries()[0];
        assert_eq!(entry.title, "Quickstart");
        assert!(entry.markdown.contains("**scene**"), "got: {}", entry.markdown);
        assert!(!entry.markdown.contains("Menu"));
        assert!(entry.render().starts_with("# Quickstart\n\n"));
    }

    #[tokio::test]
    async fn test_entry_count_independent_of_order() {
        let pages: Vec<PageResponse> = (1..=4)
            .map(|i| {
                doc_page(
                    &format!("https://example.com/page{}.html", i),
                    &format!("<h1>Page {}</h1><p>Body {}</p>", i, i),
                )
            })
            .collect();
        let dir = tempfile::tempdir().unwrap();

        let mut outputs = Vec::new();
        for (name, order) in [("forward.md", vec![0, 1, 2, 3]), ("shuffled.md", vec![2, 0, 3, 1])] {
            let path = dir.path().join(name);
            let mut pipeline = offline_pipeline(path.clone());
            for idx in order {
                pipeline.process_page(&pages[idx]).unwrap();
            }
            assert!(pipeline.finalize().await);
            outputs.push(std::fs::read_to_string(&path).unwrap());
        }

        for output in &outputs {
            assert_eq!(output.matches(ENTRY_SEPARATOR).count(), 4);
            assert!(output.ends_with(ENTRY_SEPARATOR));
        }
        assert_ne!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_finalize_with_no_entries_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.md");
        std::fs::write(&path, "previous run").unwrap();
        let mut pipeline = offline_pipeline(path.clone());

        assert!(pipeline.finalize().await);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.trim().is_empty());
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/installation.html");
                then.status(200).body(
                    r#"<html><body><div id="furo-main-content"><h1>Installation</h1><p>Steps</p></div></body></html>"#,
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.html");
                then.status(404).body("not found");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/empty.html");
                then.status(200)
                    .body(r#"<html><body><div id="furo-main-content"></div></body></html>"#);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manim_voiceover_docs.md");
        let config = test_config(
            vec![
                server.url("/installation.html"),
                server.url("/gone.html"),
                server.url("/empty.html"),
            ],
            path.clone(),
        );

        let summary = DocExtractionPipeline::new(config).unwrap().run().await;

        assert_eq!(summary.pages_attempted, 3);
        assert_eq!(summary.pages_saved, 1);
        assert_eq!(summary.http_failures, 1);
        assert_eq!(summary.empty_content, 1);
        assert!(summary.output_written);

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(output.starts_with("# Installation\n\n"), "got: {}", output);
        assert!(output.contains("Steps"));
        assert!(output.ends_with(ENTRY_SEPARATOR));
        assert_eq!(output.matches(ENTRY_SEPARATOR).count(), 1);
    }

    #[tokio::test]
    async fn test_run_accumulates_in_completion_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.html");
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .body(r#"<div id="furo-main-content"><h1>Slow</h1><p>later</p></div>"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fast.html");
                then.status(200)
                    .body(r#"<div id="furo-main-content"><h1>Fast</h1><p>sooner</p></div>"#);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.md");
        let config = test_config(
            vec![server.url("/slow.html"), server.url("/fast.html")],
            path.clone(),
        );

        let summary = DocExtractionPipeline::new(config).unwrap().run().await;
        assert_eq!(summary.pages_saved, 2);

        let output = std::fs::read_to_string(&path).unwrap();
        let fast = output.find("# Fast").unwrap();
        let slow = output.find("# Slow").unwrap();
        assert!(fast < slow, "got: {}", output);
    }

    #[tokio::test]
    async fn test_run_survives_unwritable_output() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api.html");
                then.status(200)
                    .body(r#"<div id="furo-main-content"><h1>API</h1><p>Reference</p></div>"#);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("docs.md");
        let config = test_config(vec![server.url("/api.html")], path.clone());

        let logs = CapturedLogs::default();
        let summary = {
            let _guard = tracing::subscriber::set_default(logs.subscriber());
            DocExtractionPipeline::new(config).unwrap().run().await
        };

        assert_eq!(summary.pages_saved, 1);
        assert!(!summary.output_written);
        assert_eq!(summary.output_path, path);
        assert!(!path.exists());

        let output = logs.contents();
        let path_text = path.display().to_string();
        assert!(
            output
                .lines()
                .any(|line| line.contains("ERROR") && line.contains(&path_text)),
            "no error naming {} in: {}",
            path_text,
            output
        );
    }

    #[tokio::test]
    async fn test_run_counts_network_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.md");
        let config = test_config(vec!["http://127.0.0.1:1/down.html".to_string()], path.clone());

        let summary = DocExtractionPipeline::new(config).unwrap().run().await;

        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.pages_saved, 0);
        assert!(summary.output_written);
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_selector() {
        let config = CrawlConfig {
            content_selector: "div[".to_string(),
            ..test_config(
                vec!["https://example.com/".to_string()],
                PathBuf::from("unused.md"),
            )
        };
        assert!(matches!(
            DocExtractionPipeline::new(config),
            Err(DocCrawlerError::InvalidSelector { .. })
        ));
    }
}
