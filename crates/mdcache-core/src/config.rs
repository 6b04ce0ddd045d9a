//! Construction-time configuration for the render pipeline and deploy trigger.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ref whose pushes trigger a redeploy unless configured otherwise.
pub const DEFAULT_TRACKED_REF: &str = "refs/heads/master";

/// When the post index artifact is considered stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStaleness {
    /// Only a newer template invalidates the index.
    Template,
    /// Only a newer post invalidates the index.
    LatestPost,
    /// Either a newer template or a newer post invalidates the index.
    #[default]
    TemplateOrLatestPost,
}

impl IndexStaleness {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStaleness::Template => "template",
            IndexStaleness::LatestPost => "latest-post",
            IndexStaleness::TemplateOrLatestPost => "template-or-latest-post",
        }
    }
}

impl fmt::Display for IndexStaleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexStaleness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(IndexStaleness::Template),
            "latest-post" => Ok(IndexStaleness::LatestPost),
            "template-or-latest-post" => Ok(IndexStaleness::TemplateOrLatestPost),
            other => Err(format!(
                "unknown index staleness policy '{other}' \
                 (expected template, latest-post or template-or-latest-post)"
            )),
        }
    }
}

/// Where content lives and how it is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Directory holding `*.md` sources and their cached `*.html` artifacts.
    pub content_root: PathBuf,

    /// Page template file.
    pub template_path: PathBuf,

    /// Sub-directory of `content_root` aggregated into the post index.
    pub posts_dir_name: String,

    pub index_staleness: IndexStaleness,

    /// Serialise regeneration per artifact path.
    pub regeneration_lock: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("public"),
            template_path: PathBuf::from("page.html"),
            posts_dir_name: "posts".to_string(),
            index_staleness: IndexStaleness::default(),
            regeneration_lock: true,
        }
    }
}

impl SiteConfig {
    pub fn new(content_root: impl Into<PathBuf>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            template_path: template_path.into(),
            ..Self::default()
        }
    }

    pub fn with_index_staleness(mut self, policy: IndexStaleness) -> Self {
        self.index_staleness = policy;
        self
    }

    pub fn without_regeneration_lock(mut self) -> Self {
        self.regeneration_lock = false;
        self
    }

    /// `{root}/posts`
    pub fn posts_dir(&self) -> PathBuf {
        self.content_root.join(&self.posts_dir_name)
    }

    /// `{root}/posts.html`
    pub fn index_artifact(&self) -> PathBuf {
        self.content_root.join(format!("{}.html", self.posts_dir_name))
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }
}

/// Settings for webhook-triggered redeploys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Working tree that is reset and pulled.
    pub repo_dir: PathBuf,

    /// Full ref name, e.g. `refs/heads/master`.
    pub tracked_ref: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            tracked_ref: DEFAULT_TRACKED_REF.to_string(),
        }
    }
}
