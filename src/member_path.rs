//! Validated member path used for everything the engine writes.

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path};

/// Maximum length for member paths (in bytes).
///
/// Well above any file system path limit, and far below what would make a
/// single header unreasonable.
const MAX_PATH_LENGTH: usize = 32768;

/// A validated, forward-slash-delimited path of an archive member.
///
/// `MemberPath` validates that:
/// - The path is non-empty and contains no NUL bytes
/// - The path is not absolute (does not start with `/`)
/// - No empty segments exist (no `//`), except one trailing `/`
/// - No `.` or `..` segments are present
///
/// A single trailing `/` is allowed and marks a folder marker.
///
/// Paths of members that already exist in an archive are never validated;
/// they are listed verbatim. Only paths the engine is about to write go
/// through this type.
///
/// # Examples
///
/// ```
/// use arcfold::MemberPath;
///
/// let path = MemberPath::new("docs/readme.txt").unwrap();
/// assert_eq!(path.file_name(), "readme.txt");
///
/// let marker = MemberPath::folder("docs/", "img").unwrap();
/// assert_eq!(marker.as_str(), "docs/img/");
/// assert!(marker.is_folder_marker());
///
/// assert!(MemberPath::new("../secret").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberPath(String);

impl MemberPath {
    /// Creates a new `MemberPath` from a string, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchivePath`] if the path:
    /// - Is empty or longer than the supported maximum
    /// - Contains NUL bytes
    /// - Is an absolute path
    /// - Contains empty, `.` or `..` segments
    pub fn new(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Builds the path of a file named `name` inside `folder`.
    ///
    /// `folder` is a virtual folder prefix: empty for the root, otherwise
    /// ending in `/`.
    pub fn in_folder(folder: &str, name: &str) -> Result<Self> {
        Self::new(&format!("{folder}{name}"))
    }

    /// Builds the folder-marker path for `name` inside `folder`.
    ///
    /// A trailing `/` on `name` is tolerated.
    pub fn folder(folder: &str, name: &str) -> Result<Self> {
        let name = name.trim_end_matches('/');
        if name.is_empty() {
            return Err(Error::InvalidArchivePath("empty folder name".into()));
        }
        Self::new(&format!("{folder}{name}/"))
    }

    /// Builds a member path from a path relative to a directory on disk.
    ///
    /// Host separators become `/`. Non-UTF-8 names and components such as
    /// `..` are rejected.
    pub fn from_relative_fs_path(folder: &str, relative: &Path) -> Result<Self> {
        let mut out = String::from(folder);
        for (i, component) in relative.components().enumerate() {
            let Component::Normal(name) = component else {
                return Err(Error::InvalidArchivePath(format!(
                    "unsupported component in '{}'",
                    relative.display()
                )));
            };
            let name = name.to_str().ok_or_else(|| {
                Error::InvalidArchivePath(format!(
                    "non UTF-8 file name in '{}'",
                    relative.display()
                ))
            })?;
            if i > 0 {
                out.push('/');
            }
            out.push_str(name);
        }
        Self::new(&out)
    }

    fn validate(s: &str) -> Result<()> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        if s.starts_with('/') {
            return Err(Error::InvalidArchivePath(
                "absolute path not allowed".into(),
            ));
        }

        let body = s.strip_suffix('/').unwrap_or(s);
        for segment in body.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive slashes)".into(),
                ));
            }
            if segment == "." {
                return Err(Error::InvalidArchivePath("'.' segment not allowed".into()));
            }
            if segment == ".." {
                return Err(Error::InvalidArchivePath(
                    "'..' segment not allowed (path traversal)".into(),
                ));
            }
        }

        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this path names a folder marker.
    #[inline]
    pub fn is_folder_marker(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Returns the last non-empty segment.
    pub fn file_name(&self) -> &str {
        let body = self.0.strip_suffix('/').unwrap_or(&self.0);
        body.rsplit('/').next().unwrap_or(body)
    }

    /// Returns an iterator over the path segments, ignoring a trailing `/`.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.strip_suffix('/').unwrap_or(&self.0).split('/')
    }

    /// Consumes the path and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for MemberPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for MemberPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for MemberPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}
