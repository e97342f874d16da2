//! On-disk completion cache with content-addressed entries.
//!
//! Entries are stored at `{cache_dir}/{seed}/{namespace}/{request_hash}.json`.
//! The seed partitions the cache the same way across runs; an exclusive lock
//! file holding the owner's pid and start time guards each partition against
//! concurrent runs.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::io::completion::{Completion, CompletionRequest, CompletionResponse};

/// Fixed seed for the response cache partition.
pub const CACHE_SEED: u64 = 45;

const LOCK_FILE: &str = ".lock";

/// Age after which a lock is reclaimed even if its owner looks alive.
const LOCK_STALE_AFTER_SECS: i64 = 24 * 60 * 60;

/// Compute a short hash of content for cache keys.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Exclusive handle on one cache partition. The lock is released on drop.
#[derive(Debug)]
pub struct ResponseCache {
    root: PathBuf,
    lock_path: PathBuf,
}

impl ResponseCache {
    /// Open the partition for `seed` under `cache_dir`.
    ///
    /// Returns `Ok(None)` when another live run holds the lock; callers then
    /// run without caching. A lock left behind by a dead or long-gone run is
    /// reclaimed.
    #[instrument(skip_all, fields(cache_dir = %cache_dir.display(), seed))]
    pub fn open(cache_dir: &Path, seed: u64) -> Result<Option<Self>> {
        let root = cache_dir.join(seed.to_string());
        fs::create_dir_all(&root)
            .with_context(|| format!("create cache dir {}", root.display()))?;
        let lock_path = root.join(LOCK_FILE);
        if let Some(cache) = Self::try_lock(&root, &lock_path)? {
            return Ok(Some(cache));
        }
        if lock_is_stale(&lock_path) {
            warn!(lock = %lock_path.display(), "reclaiming stale cache lock");
            match fs::remove_file(&lock_path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("remove stale cache lock {}", lock_path.display()));
                }
            }
            if let Some(cache) = Self::try_lock(&root, &lock_path)? {
                return Ok(Some(cache));
            }
        }
        warn!(lock = %lock_path.display(), "cache is locked by another run; caching disabled");
        Ok(None)
    }

    fn try_lock(root: &Path, lock_path: &Path) -> Result<Option<Self>> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(lock_path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("create cache lock {}", lock_path.display()));
            }
        };
        let cache = Self {
            root: root.to_path_buf(),
            lock_path: lock_path.to_path_buf(),
        };
        write!(file, "{} {}", process::id(), Utc::now().timestamp())
            .with_context(|| format!("write cache lock {}", lock_path.display()))?;
        debug!("cache lock acquired");
        Ok(Some(cache))
    }

    pub fn entry_path(&self, namespace: &str, request: &CompletionRequest) -> Result<PathBuf> {
        let key = serde_json::to_string(request).context("serialize cache key")?;
        Ok(self
            .root
            .join(sanitize(namespace))
            .join(format!("{}.json", content_hash(&key))))
    }

    pub fn get(&self, namespace: &str, request: &CompletionRequest) -> Result<Option<CompletionResponse>> {
        let path = self.entry_path(namespace, request)?;
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading cached response");
        let content =
            fs::read_to_string(&path).with_context(|| format!("read cache {}", path.display()))?;
        let response = serde_json::from_str(&content)
            .with_context(|| format!("parse cache {}", path.display()))?;
        Ok(Some(response))
    }

    pub fn put(
        &self,
        namespace: &str,
        request: &CompletionRequest,
        response: &CompletionResponse,
    ) -> Result<()> {
        let path = self.entry_path(namespace, request)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir {}", parent.display()))?;
        }
        debug!(path = %path.display(), "saving response to cache");
        let content = serde_json::to_string_pretty(response)?;
        fs::write(&path, content).with_context(|| format!("write cache {}", path.display()))?;
        Ok(())
    }

    pub fn remove(&self, namespace: &str, request: &CompletionRequest) -> Result<()> {
        let path = self.entry_path(namespace, request)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "evicted cached response");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove cache {}", path.display())),
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.lock_path) {
            warn!(err = %err, lock = %self.lock_path.display(), "failed to release cache lock");
        }
    }
}

/// A lock is stale when its owner process is gone or it is older than
/// [`LOCK_STALE_AFTER_SECS`]. Unreadable locks fall back to the file age.
fn lock_is_stale(lock_path: &Path) -> bool {
    let now = Utc::now().timestamp();
    let owner = fs::read_to_string(lock_path).ok().and_then(|content| {
        let (pid, created) = content.trim().split_once(' ')?;
        Some((pid.parse::<u32>().ok()?, created.parse::<i64>().ok()?))
    });
    match owner {
        Some((pid, created)) => !process_alive(pid) || now - created > LOCK_STALE_AFTER_SECS,
        None => fs::metadata(lock_path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age.as_secs() > LOCK_STALE_AFTER_SECS.unsigned_abs()),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    !proc_root.join("self").exists() || proc_root.join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

fn sanitize(namespace: &str) -> String {
    namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Completion decorator serving repeated requests from the cache.
pub struct CachedCompletion<'a> {
    inner: &'a dyn Completion,
    cache: &'a ResponseCache,
    namespace: String,
}

impl<'a> CachedCompletion<'a> {
    pub fn new(inner: &'a dyn Completion, cache: &'a ResponseCache, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            namespace: namespace.into(),
        }
    }
}

impl Completion for CachedCompletion<'_> {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        match self.cache.get(&self.namespace, request) {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(err) => warn!(err = %err, "ignoring unreadable cache entry"),
        }
        let response = self.inner.complete(request)?;
        if let Err(err) = self.cache.put(&self.namespace, request, &response) {
            warn!(err = %err, "failed to store response in cache");
        }
        Ok(response)
    }

    fn reject(&self, request: &CompletionRequest) {
        if let Err(err) = self.cache.remove(&self.namespace, request) {
            warn!(err = %err, "failed to evict rejected response");
        }
        self.inner.reject(request);
    }
}
