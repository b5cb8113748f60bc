//! Filesystem-safe cache keys derived from position and survey names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token used when a value slugs to nothing (e.g. punctuation only).
pub const DEFAULT_SLUG: &str = "skyview";

/// Normalise arbitrary text into `[a-z0-9-]`.
///
/// Lower-cases, collapses every run of other characters into a single `-`
/// and trims hyphens from both ends. Idempotent.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// Cache key naming a (raw, rendered) artifact pair.
///
/// Not collision free: requests differing only in size or projection share
/// a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(position: &str, survey: &str) -> Self {
        Self(format!("{}-{}", slugify(position), slugify(survey)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the raw FITS artifact.
    pub fn raw_file_name(&self) -> String {
        format!("{}.fits", self.0)
    }

    /// File name of the rendered PNG artifact.
    pub fn rendered_file_name(&self) -> String {
        format!("{}.png", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
