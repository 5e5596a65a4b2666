//! Archive member model.

use crate::timestamp::Timestamp;

/// Locates a member's payload inside its container without rescanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadRef {
    /// Position in the central directory of an indexed (ZIP) container.
    Indexed {
        /// Central-directory index.
        index: usize,
    },
    /// Byte offsets inside a sequential (TAR) container.
    Sequential {
        /// Offset of the first header block belonging to the member.
        header_offset: u64,
        /// Offset of the first payload byte.
        data_offset: u64,
    },
}

/// One member of an archive.
///
/// Members are read-only snapshots produced by listing a container.
/// Two members are equal when their paths are equal.
///
/// This struct is marked `#[non_exhaustive]` so that new metadata can be
/// added later; use [`Member::new`] to build one.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Member {
    /// The stored path, forward-slash delimited. A trailing `/` marks a
    /// folder marker.
    pub path: String,
    /// Uncompressed payload size in bytes; 0 for folder markers.
    pub size: u64,
    /// Modification time, if the container recorded a valid one.
    pub modified_at: Option<Timestamp>,
    /// Handle used to read the payload on demand.
    pub payload: PayloadRef,
}

impl Member {
    /// Creates a member.
    pub fn new(
        path: impl Into<String>,
        size: u64,
        modified_at: Option<Timestamp>,
        payload: PayloadRef,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            modified_at,
            payload,
        }
    }

    /// Returns true if this member is a folder marker.
    #[inline]
    pub fn is_folder_marker(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Returns the last non-empty path segment.
    pub fn name(&self) -> &str {
        let body = self.path.trim_end_matches('/');
        body.rsplit('/').next().unwrap_or(body)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Member {}

impl std::hash::Hash for Member {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
