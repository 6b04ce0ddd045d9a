//! Post index: one entry per Markdown file in the posts directory.

use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::meta::{is_markdown, read_meta};
use crate::render::format_listing_date;

/// A single post in the index. Derived on every rebuild, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostIndexEntry {
    pub href: String,
    pub title: String,
    pub modified: SystemTime,
}

/// Collect entries for every `*.md` file directly inside `posts_dir`.
///
/// Entries are ordered newest first. Files with equal timestamps keep their
/// file-name order. Documents without a `# ` heading are titled by their
/// file stem.
pub async fn collect_entries(posts_dir: &Path, href_prefix: &str) -> Result<Vec<PostIndexEntry>> {
    let mut reader = tokio::fs::read_dir(posts_dir)
        .await
        .map_err(|e| Error::from_io(posts_dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        if is_markdown(&path) && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let meta = read_meta(&path).await?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        entries.push(PostIndexEntry {
            href: format!("{}/{}", href_prefix.trim_end_matches('/'), stem),
            title: meta.title.unwrap_or_else(|| stem.clone()),
            modified: meta.modified,
        });
    }

    // Vec::sort_by is stable.
    entries.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(entries)
}

/// Render the HTML fragment listing `entries` in order.
pub fn render_fragment(heading: &str, entries: &[PostIndexEntry]) -> String {
    let mut out = format!("<h1>{}</h1>", html_escape::encode_text(heading));
    for entry in entries {
        out.push_str(&format!(
            "<a href=\"{}\">{}<br>{}</a><br><br>",
            html_escape::encode_double_quoted_attribute(&entry.href),
            html_escape::encode_text(&entry.title),
            format_listing_date(entry.modified),
        ));
    }
    out
}
