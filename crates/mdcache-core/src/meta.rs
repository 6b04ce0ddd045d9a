//! Metadata extraction for Markdown source documents.
//!
//! A document's title is the first level-1 heading written as `# Title` at
//! the very start of a line. Its modification time comes from the
//! filesystem and is never stored anywhere else.

use std::path::Path;
use std::sync::OnceLock;
use std::time::SystemTime;

use regex::Regex;

use crate::error::{Error, Result};

/// File extension recognised as Markdown source.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Title and modification time of a single source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub modified: SystemTime,
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^# ([^\r\n]+)").expect("title pattern is valid"))
}

/// Return the text of the first `# ` heading, if any.
///
/// ` # Title` (leading whitespace) and `#Title` (no space) do not count.
pub fn extract_title(markdown: &str) -> Option<String> {
    title_pattern()
        .captures(markdown)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether `path` carries the Markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == MARKDOWN_EXTENSION)
}

/// Read the title and modification time of the Markdown file at `path`.
///
/// Fails with [`Error::InvalidDocumentKind`] for non-Markdown paths and with
/// [`Error::NotFound`] when the file is absent. A document without a heading
/// yields `title: None`.
pub async fn read_meta(path: &Path) -> Result<DocumentMeta> {
    if !is_markdown(path) {
        return Err(Error::InvalidDocumentKind(path.to_path_buf()));
    }

    let markdown = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::from_io(path, e))?;
    let modified = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map_err(|e| Error::from_io(path, e))?;

    Ok(DocumentMeta {
        title: extract_title(&markdown),
        modified,
    })
}
