use crate::error::ConversionError;
use std::panic::{self, AssertUnwindSafe};

/// Turns an HTML fragment into Markdown.
pub trait MarkdownConverter {
    fn convert(&self, html: &str) -> Result<String, ConversionError>;
}

/// Converter backed by `fast_html2md`. Headings come out ATX style (`# Title`).
#[derive(Debug, Clone)]
pub struct Html2MdConverter {
    commonmark: bool,
}

impl Html2MdConverter {
    pub fn new(commonmark: bool) -> Self {
        Self { commonmark }
    }
}

impl Default for Html2MdConverter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MarkdownConverter for Html2MdConverter {
    fn convert(&self, html: &str) -> Result<String, ConversionError> {
        // The converter walks arbitrary markup; a panic in there must only cost this page.
        panic::catch_unwind(AssertUnwindSafe(|| html2md::parse_html(html, self.commonmark)))
            .map(|markdown| separate_blocks(&markdown))
            .map_err(|payload| {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "converter panicked".to_string());
                ConversionError(detail)
            })
    }
}

/// Puts a blank line between Markdown blocks that were joined by a single newline.
///
/// Fenced code is copied verbatim. Consecutive list items, table rows and quote
/// lines stay together, and runs of blank lines collapse to one.
pub fn separate_blocks(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let fence = is_fence(line);

        if in_fence {
            lines.push(line);
            in_fence = !fence;
            continue;
        }

        let prev_has_text = lines.last().is_some_and(|prev| !prev.trim().is_empty());
        if line.trim().is_empty() {
            if prev_has_text {
                lines.push("");
            }
            continue;
        }

        let needs_gap = prev_has_text
            && lines
                .last()
                .is_some_and(|prev| !continues_block(prev, line));
        if needs_gap {
            lines.push("");
        }
        lines.push(line);
        in_fence = fence;
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("```") || line.starts_with("~~~")
}

fn is_list_item(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("+ ") {
        return true;
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && (line[digits..].starts_with(". ") || line[digits..].starts_with(") "))
}

fn continues_block(prev: &str, line: &str) -> bool {
    let prev_in_list = is_list_item(prev) || prev.starts_with(char::is_whitespace);
    if prev_in_list && (is_list_item(line) || line.starts_with(char::is_whitespace)) {
        return true;
    }

    let (prev, line) = (prev.trim_start(), line.trim_start());
    (prev.starts_with('|') && line.starts_with('|'))
        || (prev.starts_with('>') && line.starts_with('>'))
}
