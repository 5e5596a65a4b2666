//! Engine configuration.

use crate::projector::ListingMode;

/// Compression applied to members newly written into an indexed (ZIP)
/// container.
///
/// Sequential (TAR) containers are always stored uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store bytes as-is.
    Stored,
    /// Deflate. Falls back to `Stored` when the `deflate` feature is
    /// disabled.
    #[default]
    Deflated,
}

/// Policy for handling existing files during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Return [`Error::DestinationExists`](crate::Error::DestinationExists)
    /// if the file exists.
    Error,
    /// Skip files that already exist.
    Skip,
    /// Overwrite existing files.
    #[default]
    Overwrite,
}

/// Options controlling every engine operation.
///
/// # Example
///
/// ```rust
/// use arcfold::{Compression, EngineOptions, ListingMode, OverwritePolicy};
///
/// let options = EngineOptions::new()
///     .compression(Compression::Stored)
///     .listing_mode(ListingMode::Nested)
///     .overwrite(OverwritePolicy::Skip);
/// assert!(options.preserve_mtime);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Compression for new indexed-format members.
    pub compression: Compression,
    /// How folder listings are projected.
    pub listing_mode: ListingMode,
    /// Policy for existing files during extraction.
    pub overwrite: OverwritePolicy,
    /// Whether to record source modification times when adding and restore
    /// them when extracting.
    pub preserve_mtime: bool,
    /// Whether to `fsync` the rebuilt container before it replaces the
    /// original during deletion.
    pub sync_before_replace: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            listing_mode: ListingMode::default(),
            overwrite: OverwritePolicy::default(),
            preserve_mtime: true,
            sync_before_replace: true,
        }
    }
}

impl EngineOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression for new indexed-format members.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the listing mode.
    pub fn listing_mode(mut self, mode: ListingMode) -> Self {
        self.listing_mode = mode;
        self
    }

    /// Sets the overwrite policy.
    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Sets whether modification times are preserved.
    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Sets whether the rebuilt container is synced before replacement.
    pub fn sync_before_replace(mut self, sync: bool) -> Self {
        self.sync_before_replace = sync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.compression, Compression::Deflated);
        assert_eq!(options.listing_mode, ListingMode::Flat);
        assert_eq!(options.overwrite, OverwritePolicy::Overwrite);
        assert!(options.preserve_mtime);
        assert!(options.sync_before_replace);
    }

    #[test]
    fn test_builder_chain() {
        let options = EngineOptions::new()
            .compression(Compression::Stored)
            .listing_mode(ListingMode::Nested)
            .overwrite(OverwritePolicy::Error)
            .preserve_mtime(false)
            .sync_before_replace(false);
        assert_eq!(options.compression, Compression::Stored);
        assert_eq!(options.listing_mode, ListingMode::Nested);
        assert_eq!(options.overwrite, OverwritePolicy::Error);
        assert!(!options.preserve_mtime);
        assert!(!options.sync_before_replace);
    }
}
