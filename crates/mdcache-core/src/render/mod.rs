//! Page rendering: Markdown (or a ready HTML fragment) + template + metadata.

pub mod markdown;
pub mod template;

use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::meta::extract_title;

pub use markdown::{CmarkEngine, MarkdownEngine};
pub use template::{Slot, SlotValues, Template};

/// Body of a page before it is placed into the content slot.
#[derive(Debug, Clone, Copy)]
pub enum PageBody<'a> {
    /// Markdown source, rendered by the engine. Also the title fallback source.
    Markdown(&'a str),
    /// Already-rendered HTML, inserted unchanged.
    Html(&'a str),
}

/// Optional metadata for a rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub updated: Option<SystemTime>,
    pub title: Option<String>,
}

/// Format a page's "updated" line, e.g. `Updated: Oct 18, 2026, 09:05 PM`.
pub fn format_updated(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    format!("Updated: {}", local.format("%b %-d, %Y, %I:%M %p"))
}

/// Format a timestamp for a post index entry, e.g. `10/18/2026, 9:05:00 PM`.
pub fn format_listing_date(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Combines page bodies with a [`Template`].
#[derive(Clone)]
pub struct PageRenderer {
    engine: Arc<dyn MarkdownEngine>,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(Arc::new(CmarkEngine::default()))
    }
}

impl PageRenderer {
    pub fn new(engine: Arc<dyn MarkdownEngine>) -> Self {
        Self { engine }
    }

    /// Render a complete HTML document.
    ///
    /// When `meta.title` is absent and the body is Markdown, the title is
    /// taken from the document's first `# ` heading.
    pub fn render(&self, body: PageBody<'_>, template: &Template, meta: PageMeta) -> String {
        let (fragment, derived_title) = match body {
            PageBody::Markdown(source) => (self.engine.render(source), extract_title(source)),
            PageBody::Html(html) => (html.to_string(), None),
        };

        template.render(&SlotValues {
            title: meta.title.or(derived_title),
            updated: meta.updated.map(format_updated),
            content: Some(format!("<div id=\"content\">{fragment}</div>")),
        })
    }
}

impl std::fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRenderer").finish_non_exhaustive()
    }
}
