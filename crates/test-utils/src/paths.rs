//! Scratch directories for cache tests.

use std::path::Path;

/// Temporary directory standing in for a cutout cache, removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("sky-cache-")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Names of regular files directly under `dir`, sorted.
///
/// Used by cache tests to check that only final artifacts (and no temp
/// files) are left behind. A missing directory lists as empty.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_is_fresh() {
        let dir = temp_test_dir();
        assert!(dir.path().is_dir());
        assert!(list_files(dir.path()).is_empty());
    }

    #[test]
    fn test_list_files_sorted_and_files_only() {
        let dir = temp_test_dir();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.fits"), b"x").unwrap();
        std::fs::write(dir.path().join(".a.fits.123.tmp"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(list_files(dir.path()), vec![".a.fits.123.tmp", "a.fits", "b.png"]);
        assert!(list_files(&dir.path().join("missing")).is_empty());
    }
}
