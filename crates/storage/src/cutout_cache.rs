//! Flat-directory cache of raw and rendered cutouts.
//!
//! The directory is created lazily on first write. Artifacts are written to
//! hidden temporary files in the same directory, synced, and renamed into
//! place; the raw file is published before the rendered one, so a rendered
//! file never exists without its raw counterpart from the same fetch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sky_common::{CacheKey, SkyError, SkyResult};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::key_lock::{KeyGuard, KeyLocks};

const RAW_EXTENSION: &str = "fits";
const RENDERED_EXTENSION: &str = "png";
const TEMP_EXTENSION: &str = "tmp";

/// Locations of the two artifacts for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: PathBuf,
    pub rendered: PathBuf,
}

/// What the cache currently holds for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Both the raw cutout and the rendered figure exist.
    Complete(ArtifactPaths),
    /// Only the raw cutout exists.
    RawOnly(ArtifactPaths),
    Missing(ArtifactPaths),
}

impl CacheEntry {
    pub fn paths(&self) -> &ArtifactPaths {
        match self {
            CacheEntry::Complete(p) | CacheEntry::RawOnly(p) | CacheEntry::Missing(p) => p,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, CacheEntry::Complete(_))
    }
}

/// Snapshot of cache contents and lookup counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub raw_files: u64,
    pub rendered_files: u64,
    pub total_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Cache of cutout artifacts under a single root directory.
#[derive(Clone)]
pub struct CutoutCache {
    root: PathBuf,
    locks: KeyLocks,
    counters: Arc<Counters>,
}

impl CutoutCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: KeyLocks::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self, key: &CacheKey) -> ArtifactPaths {
        ArtifactPaths {
            raw: self.root.join(key.raw_file_name()),
            rendered: self.root.join(key.rendered_file_name()),
        }
    }

    /// Inspect the cache for `key` and count the lookup.
    pub async fn lookup(&self, key: &CacheKey) -> CacheEntry {
        let paths = self.paths(key);
        let raw = is_file(&paths.raw).await;
        let rendered = is_file(&paths.rendered).await;

        let entry = match (raw, rendered) {
            (true, true) => CacheEntry::Complete(paths),
            (true, false) => CacheEntry::RawOnly(paths),
            // A figure without its raw cutout is treated as absent.
            _ => CacheEntry::Missing(paths),
        };

        if entry.is_complete() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        debug!(key = %key, entry = entry_kind(&entry), "Cache lookup");
        entry
    }

    /// Exclusive producer access to `key`.
    pub async fn lock(&self, key: &CacheKey) -> KeyGuard {
        self.locks.lock(key.as_str()).await
    }

    /// Keys with a producer running or waiting.
    pub fn in_flight(&self) -> usize {
        self.locks.active()
    }

    /// Publish both artifacts for `key`, replacing any previous ones.
    pub async fn persist(&self, key: &CacheKey, raw: &[u8], rendered: &[u8]) -> SkyResult<ArtifactPaths> {
        self.ensure_root().await?;
        let paths = self.paths(key);

        let raw_tmp = self.stage(&paths.raw, raw).await?;
        let rendered_tmp = match self.stage(&paths.rendered, rendered).await {
            Ok(tmp) => tmp,
            Err(e) => {
                discard(&raw_tmp).await;
                return Err(e);
            }
        };

        if let Err(e) = publish(&raw_tmp, &paths.raw).await {
            discard(&raw_tmp).await;
            discard(&rendered_tmp).await;
            return Err(e);
        }
        if let Err(e) = publish(&rendered_tmp, &paths.rendered).await {
            discard(&rendered_tmp).await;
            return Err(e);
        }

        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        info!(
            key = %key,
            raw_bytes = raw.len(),
            rendered_bytes = rendered.len(),
            "Stored cutout"
        );
        Ok(paths)
    }

    /// Publish only the rendered figure for a key whose raw cutout exists.
    pub async fn persist_rendered(&self, key: &CacheKey, rendered: &[u8]) -> SkyResult<ArtifactPaths> {
        self.ensure_root().await?;
        let paths = self.paths(key);

        let tmp = self.stage(&paths.rendered, rendered).await?;
        if let Err(e) = publish(&tmp, &paths.rendered).await {
            discard(&tmp).await;
            return Err(e);
        }

        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        info!(key = %key, rendered_bytes = rendered.len(), "Stored re-rendered figure");
        Ok(paths)
    }

    pub async fn read_raw(&self, key: &CacheKey) -> SkyResult<Vec<u8>> {
        read(&self.paths(key).raw).await
    }

    pub async fn read_rendered(&self, key: &CacheKey) -> SkyResult<Vec<u8>> {
        read(&self.paths(key).rendered).await
    }

    /// Count artifacts on disk. Temporary files are ignored.
    pub async fn stats(&self) -> SkyResult<CacheStats> {
        let mut stats = CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(io_error("list", &self.root, e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_error("list", &self.root, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let extension = Path::new(name.as_ref())
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let counter = match extension {
                RAW_EXTENSION => &mut stats.raw_files,
                RENDERED_EXTENSION => &mut stats.rendered_files,
                _ => continue,
            };
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            *counter += 1;
            stats.total_bytes += metadata.len();
        }

        Ok(stats)
    }

    async fn ensure_root(&self) -> SkyResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error("create", &self.root, e))
    }

    /// Write `data` to a hidden temporary sibling of `target` and sync it.
    async fn stage(&self, target: &Path, data: &[u8]) -> SkyResult<PathBuf> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .root
            .join(format!(".{}.{}.{}", file_name, Uuid::new_v4(), TEMP_EXTENSION));

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        match result {
            Ok(()) => Ok(tmp),
            Err(e) => {
                discard(&tmp).await;
                Err(io_error("write", &tmp, e))
            }
        }
    }
}

async fn publish(tmp: &Path, target: &Path) -> SkyResult<()> {
    fs::rename(tmp, target)
        .await
        .map_err(|e| io_error("rename", target, e))
}

async fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %tmp.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

async fn read(path: &Path) -> SkyResult<Vec<u8>> {
    fs::read(path).await.map_err(|e| io_error("read", path, e))
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> SkyError {
    SkyError::StoreIo(format!("failed to {} {}: {}", action, path.display(), e))
}

fn entry_kind(entry: &CacheEntry) -> &'static str {
    match entry {
        CacheEntry::Complete(_) => "complete",
        CacheEntry::RawOnly(_) => "raw_only",
        CacheEntry::Missing(_) => "missing",
    }
}
