//! On-disk artifact cache keyed by file path and validated by mtime.
//!
//! [`CacheStore::ensure_fresh`] guarantees that an artifact exists and was
//! regenerated if the caller's staleness predicate says so. The store owns
//! no data itself; the filesystem is the cache.

pub mod fs;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs::{emit_artifact_created, emit_artifact_fresh, emit_artifact_regenerated};

/// What [`CacheStore::refresh`] did to the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// The artifact did not exist and was written.
    Created,
    /// The artifact was stale and was overwritten.
    Regenerated,
    /// The artifact was current; nothing was written.
    Fresh,
}

/// Result of a cache refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
    pub path: PathBuf,
    pub action: CacheAction,
}

type LockMap = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

/// Filesystem artifact cache.
///
/// By default regeneration is serialised per artifact path, so concurrent
/// requests for the same stale artifact generate it once. [`CacheStore::unlocked`]
/// drops that guarantee: racing callers may both regenerate and the last
/// write wins.
#[derive(Clone)]
pub struct CacheStore {
    locks: Option<Arc<LockMap>>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("locked", &self.locks.is_some())
            .finish()
    }
}

impl CacheStore {
    /// Cache with per-artifact regeneration locks.
    pub fn new() -> Self {
        Self {
            locks: Some(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Cache without locking.
    pub fn unlocked() -> Self {
        Self { locks: None }
    }

    fn lock_for(&self, path: &Path) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let locks = self.locks.as_ref()?;
        let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(map.entry(path.to_path_buf()).or_default().clone())
    }

    /// Ensure `path` exists and is not stale, returning `path`.
    ///
    /// * missing artifact: `generate` runs and its output is written.
    /// * existing artifact: `is_stale(artifact_mtime)` decides whether to
    ///   regenerate and overwrite.
    /// * any stat failure other than "not found" is returned.
    pub async fn ensure_fresh<G, GF, S, SF>(
        &self,
        path: &Path,
        generate: G,
        is_stale: S,
    ) -> Result<PathBuf>
    where
        G: FnOnce() -> GF,
        GF: Future<Output = Result<String>>,
        S: FnOnce(SystemTime) -> SF,
        SF: Future<Output = Result<bool>>,
    {
        Ok(self.refresh(path, generate, is_stale).await?.path)
    }

    /// [`ensure_fresh`](Self::ensure_fresh), also reporting what happened.
    pub async fn refresh<G, GF, S, SF>(
        &self,
        path: &Path,
        generate: G,
        is_stale: S,
    ) -> Result<CacheOutcome>
    where
        G: FnOnce() -> GF,
        GF: Future<Output = Result<String>>,
        S: FnOnce(SystemTime) -> SF,
        SF: Future<Output = Result<bool>>,
    {
        let lock = self.lock_for(path);
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let action = match fs::modified_if_exists(path).await? {
            None => CacheAction::Created,
            Some(artifact_time) => {
                if is_stale(artifact_time).await? {
                    CacheAction::Regenerated
                } else {
                    CacheAction::Fresh
                }
            }
        };

        if action == CacheAction::Fresh {
            METRICS.inc_cache_hits();
            emit_artifact_fresh(path);
        } else {
            let started = Instant::now();
            let contents = generate().await?;
            fs::write_atomic(path, contents).await?;
            let duration_ms = started.elapsed().as_millis() as u64;
            if action == CacheAction::Created {
                METRICS.inc_created();
                emit_artifact_created(path, duration_ms);
            } else {
                METRICS.inc_regenerated();
                emit_artifact_regenerated(path, duration_ms);
            }
        }

        Ok(CacheOutcome {
            path: path.to_path_buf(),
            action,
        })
    }
}
