//! Cache reuse decisions and per-resource locking.
//!
//! Registry packages keep a small sidecar record describing what the
//! hydrated directory holds. Git resources have no sidecar: a checkout that
//! exists is re-synced in place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{HydrationError, HydrationResult};

/// Sidecar file name inside a registry package directory.
pub const CACHE_META_FILE: &str = ".quarry-cache.json";

/// What a hydrated registry-package directory currently contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    pub package_name: String,
    /// Version or tag as requested; absent for "latest".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_version: Option<String>,
    pub resolved_version: String,
    pub package_url: String,
    pub listing_url: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheMeta {
    pub fn path_in(resource_dir: &Path) -> PathBuf {
        resource_dir.join(CACHE_META_FILE)
    }

    /// Read the sidecar, treating a missing or unreadable file as no cache.
    pub async fn read(resource_dir: &Path) -> Option<Self> {
        let path = Self::path_in(resource_dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cache metadata");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring corrupt cache metadata");
                None
            }
        }
    }

    pub async fn write(&self, resource_dir: &Path) -> HydrationResult<()> {
        let path = Self::path_in(resource_dir);
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| {
            HydrationError::parse("Failed to serialize cache metadata").with_source(e)
        })?;
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            HydrationError::io(
                format!("Failed to write cache metadata: {}", path.display()),
                e,
            )
        })
    }
}

/// Whether a registry package can be served from its existing directory.
///
/// Only pinned, persistent requests ever reuse cache: "latest" moves, and
/// ephemeral resources are thrown away after one request anyway.
pub fn can_reuse_npm(
    package_name: &str,
    requested_version: Option<&str>,
    ephemeral: bool,
    meta: Option<&CacheMeta>,
) -> bool {
    let Some(requested) = requested_version else {
        debug!(package = package_name, "unpinned request, skipping cache");
        return false;
    };
    if ephemeral {
        return false;
    }
    let Some(meta) = meta else {
        return false;
    };
    meta.package_name == package_name
        && meta.requested_version.as_deref() == Some(requested)
        && !meta.resolved_version.is_empty()
}

/// True when `dir` holds a git checkout that can be re-synced in place.
pub fn git_checkout_present(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// In-process mutual exclusion per resource directory.
///
/// Two requests for the same uncached resource serialize on the
/// check -> stage -> promote -> write-meta sequence instead of both doing
/// the network and install work. An entry lives only while some request
/// holds or waits on it.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    locks: Arc<Mutex<LockMap>>,
}

type LockMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `dir`.
    pub async fn acquire(&self, dir: &Path) -> KeyLockGuard {
        let lock = {
            let mut locks = lock_map(&self.locks);
            locks
                .entry(dir.to_path_buf())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        KeyLockGuard {
            guard: Some(lock.lock_owned().await),
            dir: dir.to_path_buf(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of directories currently locked or waited on.
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

/// Held access to one resource directory; releases and prunes on drop.
#[derive(Debug)]
pub struct KeyLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    dir: PathBuf,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        // Waiters clone the entry under the map lock, so a count of one
        // means nobody else can reach it.
        if locks
            .get(&self.dir)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.dir);
        }
    }
}

fn lock_map(locks: &Mutex<LockMap>) -> std::sync::MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
