//! mdcache core library
//!
//! Renders Markdown documents into HTML pages on demand, caches the result
//! next to the source, synthesizes a post index and redeploys the site from
//! verified GitHub push webhooks.

pub mod cache;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fakes;
pub mod git;
pub mod meta;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod render;
pub mod restart;
pub mod telemetry;
pub mod webhook;

pub use cache::{CacheAction, CacheOutcome, CacheStore};
pub use config::{DeployConfig, IndexStaleness, SiteConfig, DEFAULT_TRACKED_REF};
pub use deploy::{DeployOutcome, DeployTrigger, HeadCommit, PushEvent};
pub use error::{Error, Result};
pub use git::{is_git_repo, CommandOutput, GitRepository, Repository};
pub use meta::{extract_title, read_meta, DocumentMeta};
pub use pipeline::{BuildReport, ContentPaths, PostIndexEntry, RenderPipeline};
pub use render::{CmarkEngine, MarkdownEngine, PageBody, PageMeta, PageRenderer, Template};
pub use restart::RestartSignal;
pub use webhook::{VerifiedPayload, WebhookGate};

pub use metrics::METRICS;
pub use obs::request_span;
pub use telemetry::{init_tracing, LogFormat};

/// mdcache version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
