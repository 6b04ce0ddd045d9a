//! Structured observability hooks for cache and deploy lifecycle events.
//!
//! Events are emitted at `info!` level unless noted. For JSON output, start
//! the daemon with `--json`.

use std::path::Path;

use tracing::{debug, info, warn};

/// Span covering one content request.
///
/// Futures are attached with `tracing::Instrument::instrument`, so the span
/// stays correct across await points.
pub fn request_span(request_path: &str) -> tracing::Span {
    tracing::info_span!("mdcache.request", request_path = %request_path)
}

/// Emit event: an artifact was written for the first time.
pub fn emit_artifact_created(path: &Path, duration_ms: u64) {
    info!(event = "cache.created", path = %path.display(), duration_ms = duration_ms);
}

/// Emit event: a stale artifact was regenerated.
pub fn emit_artifact_regenerated(path: &Path, duration_ms: u64) {
    info!(event = "cache.regenerated", path = %path.display(), duration_ms = duration_ms);
}

/// Emit event: an artifact was already fresh (debug level).
pub fn emit_artifact_fresh(path: &Path) {
    debug!(event = "cache.fresh", path = %path.display());
}

/// Emit event: webhook signature check failed (warning level).
pub fn emit_webhook_rejected(reason: &str) {
    warn!(event = "webhook.rejected", reason = %reason);
}

/// Emit event: a verified webhook did not lead to a deploy.
pub fn emit_deploy_skipped(git_ref: &str, reason: &str) {
    info!(event = "deploy.skipped", git_ref = %git_ref, reason = %reason);
}

/// Emit event: reset + pull completed.
pub fn emit_deploy_finished(commit: &str, duration_ms: u64) {
    info!(event = "deploy.finished", commit = %commit, duration_ms = duration_ms);
}

/// Emit event: reset or pull failed (warning level).
pub fn emit_deploy_failed(commit: &str, error: &dyn std::fmt::Display) {
    warn!(event = "deploy.failed", commit = %commit, error = %error);
}
