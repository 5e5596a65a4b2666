//! Extraction path validation.
//!
//! Member paths come from the archive and may be hostile. Every path is
//! checked before anything is written so that extraction can never touch a
//! file outside the destination directory.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Maps a stored member path to its location under `dest_root`.
///
/// Both `/` and `\` are treated as separators. Empty and `.` segments are
/// ignored.
///
/// # Errors
///
/// Returns [`Error::PathTraversal`] if the path is absolute, contains a `..`
/// segment or a drive prefix, or resolves (through existing symlinks) to a
/// location outside `dest_root`. Returns [`Error::Io`] if `dest_root`
/// cannot be canonicalized.
pub fn validate_extract_path(member_path: &str, dest_root: &Path) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        path: member_path.to_string(),
    };

    if member_path.starts_with('/') || member_path.starts_with('\\') {
        return Err(traversal());
    }

    let mut full_path = dest_root.to_path_buf();
    for segment in member_path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(traversal()),
            s if s.contains(':') => return Err(traversal()),
            s => full_path.push(s),
        }
    }

    // Verify the resolved path stays within dest_root.
    let canonical_dest = dest_root.canonicalize()?;

    let mut ancestor = full_path.as_path();
    let mut pending = Vec::new();
    while !ancestor.exists() {
        match (ancestor.file_name(), ancestor.parent()) {
            (Some(name), Some(parent)) => {
                pending.push(name.to_os_string());
                ancestor = parent;
            }
            _ => return Err(traversal()),
        }
    }

    let mut resolved = ancestor.canonicalize()?;
    for name in pending.into_iter().rev() {
        resolved.push(name);
    }
    if resolved
        .components()
        .any(|c| matches!(c, Component::ParentDir))
        || !resolved.starts_with(&canonical_dest)
    {
        return Err(traversal());
    }

    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_simple_path() {
        let dir = TempDir::new().unwrap();
        let path = validate_extract_path("a/b.txt", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("a").join("b.txt"));
    }

    #[test]
    fn test_folder_marker_maps_to_directory() {
        let dir = TempDir::new().unwrap();
        let path = validate_extract_path("notes/", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("notes"));
    }

    #[test]
    fn test_rejects_parent_segments() {
        let dir = TempDir::new().unwrap();
        for hostile in ["../x", "a/../../x", "a\\..\\x"] {
            let err = validate_extract_path(hostile, dir.path()).unwrap_err();
            assert!(matches!(err, Error::PathTraversal { .. }), "{hostile}");
        }
    }

    #[test]
    fn test_rejects_absolute() {
        let dir = TempDir::new().unwrap();
        assert!(validate_extract_path("/etc/passwd", dir.path()).is_err());
        assert!(validate_extract_path("C:/Windows/x", dir.path()).is_err());
    }

    #[test]
    fn test_dot_segments_ignored() {
        let dir = TempDir::new().unwrap();
        let path = validate_extract_path("./a//b", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("a").join("b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let err = validate_extract_path("link/evil.txt", dir.path()).unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
    }
}
