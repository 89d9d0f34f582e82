use crate::error::{DocCrawlerError, Result};
use crate::types::{MarkdownEntry, ENTRY_SEPARATOR};
use std::path::Path;
use tokio::fs;
use tracing::debug;

pub struct OutputWriter;

impl OutputWriter {
    /// Every entry is followed by the separator, the last one included.
    pub fn render(entries: &[MarkdownEntry]) -> String {
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.render());
            content.push_str(ENTRY_SEPARATOR);
        }
        content
    }

    /// Replaces whatever is at `path` with the rendered entries.
    pub async fn write(path: &Path, entries: &[MarkdownEntry]) -> Result<()> {
        let content = Self::render(entries);

        fs::write(path, &content)
            .await
            .map_err(|e| DocCrawlerError::OutputFile {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(
            "Wrote {} entries ({} bytes) to {}",
            entries.len(),
            content.len(),
            path.display()
        );
        Ok(())
    }
}
