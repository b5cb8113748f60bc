//! On-disk storage for survey cutouts.
//!
//! Each cache key owns two files in a single flat directory: the raw FITS
//! cutout (`<key>.fits`) and the rendered figure (`<key>.png`). Writers hold
//! a per-key lock from [`KeyLocks`] so identical concurrent requests cause a
//! single upstream fetch, and every file is published with a rename so
//! readers never observe a partially written artifact.

pub mod cutout_cache;
pub mod key_lock;

pub use cutout_cache::{ArtifactPaths, CacheEntry, CacheStats, CutoutCache};
pub use key_lock::{KeyGuard, KeyLocks};
