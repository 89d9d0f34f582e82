use crate::error::{DocCrawlerError, Result};
use crate::types::{ExtractedFragment, PageResponse};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Pulls the documentation region and page heading out of raw HTML.
pub struct ContentExtractor {
    content_selector: Selector,
    title_selector: Selector,
}

impl ContentExtractor {
    pub fn new(content_selector: &str, title_selector: &str) -> Result<Self> {
        Ok(Self {
            content_selector: Self::parse_selector(content_selector)?,
            title_selector: Self::parse_selector(title_selector)?,
        })
    }

    fn parse_selector(selector: &str) -> Result<Selector> {
        Selector::parse(selector).map_err(|e| DocCrawlerError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }

    /// Returns the outer HTML of the first content region plus the page title, if any.
    ///
    /// A region whose inner markup is blank counts as empty.
    pub fn extract(&self, response: &PageResponse) -> Result<ExtractedFragment> {
        let document = Html::parse_document(&response.body);

        let region = document
            .select(&self.content_selector)
            .next()
            .ok_or_else(|| DocCrawlerError::ContentNotFound {
                url: response.url.clone(),
            })?;

        if region.inner_html().trim().is_empty() {
            return Err(DocCrawlerError::EmptyContent {
                url: response.url.clone(),
            });
        }

        let content_html = region.html();
        let title = document
            .select(&self.title_selector)
            .next()
            .map(heading_text)
            .filter(|title| !title.is_empty());

        debug!(
            "Extracted {} bytes of content from {} (title: {:?})",
            content_html.len(),
            response.url,
            title
        );

        Ok(ExtractedFragment {
            title,
            content_html,
        })
    }
}

// Direct text of the heading skips permalink anchors nested inside it.
fn heading_text(heading: ElementRef<'_>) -> String {
    let direct: String = heading
        .children()
        .filter_map(|child| child.value().as_text())
        .fold(String::new(), |mut acc, text| {
            acc.push_str(text);
            acc
        });

    if direct.trim().is_empty() {
        heading.text().collect::<String>().trim().to_string()
    } else {
        direct.trim().to_string()
    }
}
