//! Result of a successful cutout request.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// How the artifacts of a product came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Both artifacts were already cached.
    Hit,
    /// Raw artifact was cached; only the PNG was regenerated.
    Rerendered,
    /// Fetched from the survey service by this request.
    Fetched,
    /// Produced by a concurrent request for the same key while this one waited.
    Coalesced,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Rerendered => "rerendered",
            CacheStatus::Fetched => "fetched",
            CacheStatus::Coalesced => "coalesced",
        }
    }

    /// True when no upstream call was made on behalf of this request.
    pub fn served_from_cache(&self) -> bool {
        !matches!(self, CacheStatus::Fetched)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths and request metadata for a cached cutout.
#[derive(Debug, Clone, Serialize)]
pub struct CutoutProduct {
    pub raw_path: PathBuf,
    pub rendered_path: PathBuf,
    pub position: String,
    pub survey: String,
    pub width_deg: f64,
    pub height_deg: f64,
    pub pixels: u32,
    pub cache_status: CacheStatus,
}
