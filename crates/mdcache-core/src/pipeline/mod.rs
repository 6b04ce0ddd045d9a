//! Request path → cached HTML file.
//!
//! [`RenderPipeline`] maps request paths onto `{root}/{path}.md` sources and
//! `{root}/{path}.html` artifacts, keeps artifacts fresh through the
//! [`CacheStore`], and builds the synthesized post index.

pub mod index;

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::cache::{fs, CacheAction, CacheOutcome, CacheStore};
use crate::config::{IndexStaleness, SiteConfig};
use crate::error::{Error, Result};
use crate::meta::{is_markdown, MARKDOWN_EXTENSION};
use crate::render::{PageBody, PageMeta, PageRenderer, Template};

pub use index::PostIndexEntry;

/// Document served for `/`.
pub const INDEX_DOCUMENT: &str = "index";

/// Title of the synthesized post index page.
pub const POSTS_TITLE: &str = "Posts";

const ARTIFACT_EXTENSION: &str = "html";

/// Source and artifact locations for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPaths {
    pub source: PathBuf,
    pub artifact: PathBuf,
}

/// Counts from a batch build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub created: usize,
    pub regenerated: usize,
    pub fresh: usize,
}

impl BuildReport {
    fn record(&mut self, action: CacheAction) {
        match action {
            CacheAction::Created => self.created += 1,
            CacheAction::Regenerated => self.regenerated += 1,
            CacheAction::Fresh => self.fresh += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.regenerated + self.fresh
    }
}

/// Modification time of a request-derived path, `None` when it cannot be read.
async fn lookup_modified(path: &Path) -> Option<SystemTime> {
    match fs::modified(path).await {
        Ok(time) => Some(time),
        Err(Error::NotFound(_)) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable path treated as absent");
            None
        }
    }
}

fn with_appended_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Renders and caches site content.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    config: SiteConfig,
    renderer: PageRenderer,
    cache: CacheStore,
}

impl RenderPipeline {
    /// Pipeline using the default Markdown engine.
    pub fn new(config: SiteConfig) -> Self {
        Self::with_renderer(config, PageRenderer::default())
    }

    pub fn with_renderer(config: SiteConfig, renderer: PageRenderer) -> Self {
        let cache = if config.regeneration_lock {
            CacheStore::new()
        } else {
            CacheStore::unlocked()
        };
        Self {
            config,
            renderer,
            cache,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Map a request path to its source and artifact files.
    ///
    /// `/` maps to the index document. Paths with `..`, `.` or other
    /// non-plain components are [`Error::NotFound`].
    pub fn content_paths(&self, request_path: &str) -> Result<ContentPaths> {
        let trimmed = request_path.trim_start_matches('/');
        let relative = if trimmed.is_empty() {
            INDEX_DOCUMENT
        } else {
            trimmed
        };

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::NotFound(relative.to_path_buf()));
        }
        let normalized: PathBuf = relative.components().collect();
        let base = self.config.content_root.join(normalized);

        Ok(ContentPaths {
            source: with_appended_extension(&base, MARKDOWN_EXTENSION),
            artifact: with_appended_extension(&base, ARTIFACT_EXTENSION),
        })
    }

    /// Return the HTML file to serve for `request_path`, rendering it if needed.
    ///
    /// Without a Markdown source an existing artifact is served unchanged;
    /// with neither, the result is [`Error::NotFound`]. A source or artifact
    /// that cannot be stat'ed at all, such as `style.css/x.md` under a
    /// regular file, counts as absent.
    pub async fn resolve(&self, request_path: &str) -> Result<PathBuf> {
        let paths = self.content_paths(request_path)?;

        let Some(source_time) = lookup_modified(&paths.source).await else {
            if lookup_modified(&paths.artifact).await.is_some() {
                debug!(artifact = %paths.artifact.display(), "serving artifact without source");
                return Ok(paths.artifact);
            }
            return Err(Error::NotFound(paths.source));
        };

        let outcome = self
            .refresh_page(&paths.source, &paths.artifact, source_time)
            .await?;
        Ok(outcome.path)
    }

    async fn refresh_page(
        &self,
        source: &Path,
        artifact: &Path,
        source_time: SystemTime,
    ) -> Result<CacheOutcome> {
        self.cache
            .refresh(
                artifact,
                || async move {
                    let template = self.read_template().await?;
                    let markdown = tokio::fs::read_to_string(source)
                        .await
                        .map_err(|e| Error::from_io(source, e))?;
                    Ok::<_, Error>(self.renderer.render(
                        PageBody::Markdown(&markdown),
                        &template,
                        PageMeta {
                            updated: Some(source_time),
                            title: None,
                        },
                    ))
                },
                |artifact_time| async move { Ok(source_time > artifact_time) },
            )
            .await
    }

    /// Build (or reuse) the post index artifact and return its path.
    ///
    /// Fails with [`Error::EmptyCollection`] when the posts directory is
    /// missing or holds no Markdown documents.
    pub async fn build_index(&self) -> Result<PathBuf> {
        Ok(self.refresh_index().await?.path)
    }

    async fn refresh_index(&self) -> Result<CacheOutcome> {
        let posts_dir = self.config.posts_dir();
        let href_prefix = format!("/{}", self.config.posts_dir_name);
        let entries = match index::collect_entries(&posts_dir, &href_prefix).await {
            Err(Error::NotFound(_)) => return Err(Error::EmptyCollection(posts_dir)),
            other => other?,
        };
        let latest = entries
            .first()
            .map(|entry| entry.modified)
            .ok_or_else(|| Error::EmptyCollection(posts_dir.clone()))?;

        let policy = self.config.index_staleness;
        let entries = &entries;
        self.cache
            .refresh(
                &self.config.index_artifact(),
                || async move {
                    let template = self.read_template().await?;
                    let fragment = index::render_fragment(POSTS_TITLE, entries);
                    Ok::<_, Error>(self.renderer.render(
                        PageBody::Html(&fragment),
                        &template,
                        PageMeta {
                            updated: Some(latest),
                            title: Some(POSTS_TITLE.to_string()),
                        },
                    ))
                },
                |artifact_time| async move {
                    let post_newer = latest > artifact_time;
                    Ok::<_, Error>(match policy {
                        IndexStaleness::LatestPost => post_newer,
                        IndexStaleness::Template => self.template_modified().await? > artifact_time,
                        IndexStaleness::TemplateOrLatestPost => {
                            self.template_modified().await? > artifact_time || post_newer
                        }
                    })
                },
            )
            .await
    }

    /// Render every Markdown source under the content root, then the post index.
    pub async fn build_all(&self) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        for source in self.markdown_sources().await? {
            let artifact = source.with_extension(ARTIFACT_EXTENSION);
            let source_time = fs::modified(&source).await?;
            let outcome = self.refresh_page(&source, &artifact, source_time).await?;
            debug!(path = %outcome.path.display(), action = ?outcome.action, "page built");
            report.record(outcome.action);
        }

        match self.refresh_index().await {
            Ok(outcome) => report.record(outcome.action),
            Err(Error::EmptyCollection(_)) => {
                debug!(posts_dir = %self.config.posts_dir().display(), "no posts, index skipped");
            }
            Err(e) => return Err(e),
        }

        info!(
            created = report.created,
            regenerated = report.regenerated,
            fresh = report.fresh,
            "batch build finished"
        );
        Ok(report)
    }

    /// All `*.md` files below the content root, skipping hidden entries.
    async fn markdown_sources(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.content_root;
        let mut pending = vec![root.clone()];
        let mut sources = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| Error::from_io(&dir, e))?;
            while let Some(entry) = reader.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && is_markdown(&path) {
                    sources.push(path);
                }
            }
        }

        sources.sort();
        Ok(sources)
    }

    async fn read_template(&self) -> Result<Template> {
        // A missing template is a server fault, never a 404.
        let source = tokio::fs::read_to_string(&self.config.template_path).await?;
        Template::parse(&source)
    }

    async fn template_modified(&self) -> Result<SystemTime> {
        let metadata = tokio::fs::metadata(&self.config.template_path).await?;
        Ok(metadata.modified()?)
    }
}
