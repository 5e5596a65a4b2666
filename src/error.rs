//! Error types for archive browsing and mutation.
//!
//! This module provides the [`Error`] enum which represents every expected
//! failure of the engine and the session, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Expected
//! conditions (a missing member, an empty selection, a corrupt archive) are
//! always reported as values. A panic indicates a bug in this crate.
//!
//! ```rust,no_run
//! use arcfold::{ArchiveSession, EngineOptions, Error};
//!
//! let mut session = ArchiveSession::new(EngineOptions::default());
//! match session.open("backup.zip") {
//!     Ok(()) => println!("{} members", session.list()?.len()),
//!     Err(Error::NotAnArchive { reason, .. }) => eprintln!("not an archive: {reason}"),
//!     Err(Error::InvalidArchive(msg)) => eprintln!("damaged archive: {msg}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), Error>(())
//! ```

use std::io;

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`NotAnArchive`][Self::NotAnArchive], [`InvalidArchive`][Self::InvalidArchive] | Wrong or damaged file |
/// | Lookup | [`MemberNotFound`][Self::MemberNotFound], [`EntryExists`][Self::EntryExists] | Member set mismatch |
/// | Usage | [`NoArchiveOpen`][Self::NoArchiveOpen], [`NothingSelected`][Self::NothingSelected], [`InvalidArchivePath`][Self::InvalidArchivePath] | Caller mistakes |
/// | Security | [`PathTraversal`][Self::PathTraversal] | Hostile member names |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    ///
    /// Check the underlying [`std::io::ErrorKind`] for specific handling:
    ///
    /// ```rust
    /// use arcfold::Error;
    /// use std::io::ErrorKind;
    ///
    /// fn describe(error: &Error) -> &'static str {
    ///     match error {
    ///         Error::Io(e) if e.kind() == ErrorKind::NotFound => "file not found",
    ///         Error::Io(e) if e.kind() == ErrorKind::PermissionDenied => "access denied",
    ///         _ => "other",
    ///     }
    /// }
    /// ```
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A mutation, listing, or extraction was requested before any archive
    /// was created or opened.
    #[error("no archive is open")]
    NoArchiveOpen,

    /// The file is not an archive of a supported format.
    ///
    /// Raised when the extension is unknown or the leading bytes do not
    /// match the format the extension promises.
    #[error("'{path}' is not a supported archive: {reason}")]
    NotAnArchive {
        /// The file that was inspected.
        path: String,
        /// What was expected vs. found.
        reason: String,
    },

    /// The archive structure is corrupt or truncated.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// A requested member path does not exist in the archive.
    #[error("member not found: {path}")]
    MemberNotFound {
        /// The path that was looked up.
        path: String,
    },

    /// An operation that needs a selection was given an empty one.
    #[error("nothing selected")]
    NothingSelected,

    /// The indexed format refused to store a second member with the same
    /// name.
    #[error("member already exists: {path}")]
    EntryExists {
        /// The duplicate path.
        path: String,
    },

    /// An archive path failed validation.
    ///
    /// Returned by [`MemberPath::new`] and when navigating into a row that
    /// is not a folder.
    ///
    /// [`MemberPath::new`]: crate::MemberPath::new
    #[error("invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// A member would be extracted outside the destination directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending member path.
        path: String,
    },

    /// Extraction target already exists and the overwrite policy forbids
    /// replacing it.
    #[error("destination already exists: {path}")]
    DestinationExists {
        /// The existing file.
        path: String,
    },
}

impl Error {
    /// Returns `true` if the error was caused by how the API was called
    /// rather than by the archive or the file system.
    ///
    /// ```rust
    /// use arcfold::Error;
    ///
    /// assert!(Error::NothingSelected.is_user_error());
    /// assert!(!Error::InvalidArchive("bad".into()).is_user_error());
    /// ```
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::NoArchiveOpen | Error::NothingSelected | Error::InvalidArchivePath(_)
        )
    }

    /// Returns `true` if this error indicates a damaged or foreign file.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::NotAnArchive { .. } | Error::InvalidArchive(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Returns the member path associated with this error, if any.
    pub fn member_path(&self) -> Option<&str> {
        match self {
            Error::MemberNotFound { path }
            | Error::EntryExists { path }
            | Error::PathTraversal { path }
            | Error::DestinationExists { path } => Some(path.as_str()),
            _ => None,
        }
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
