//! Container adapters for the supported archive formats.
//!
//! An archive file is a *container*. Two formats are supported:
//!
//! | Format | Kind | Metadata | Payload |
//! |--------|------|----------|---------|
//! | ZIP | indexed | trailing central directory | deflated or stored |
//! | TAR | sequential | one header per member | stored |
//!
//! Both formats are hidden behind [`ContainerAdapter`], selected once per
//! container with [`adapter_for`]. The adapter opens short-lived
//! [`ContainerReader`]s and [`ContainerWriter`]s; no handle outlives the
//! operation that opened it.

mod central;
mod indexed;
mod sequential;

pub use self::indexed::ZipAdapter;
pub use self::sequential::TarAdapter;

use crate::member::Member;
use crate::member_path::MemberPath;
use crate::options::Compression;
use crate::timestamp::Timestamp;
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Size of a TAR header block.
const TAR_BLOCK: usize = 512;

/// Offset of the USTAR magic inside a TAR header block.
const TAR_MAGIC_OFFSET: usize = 257;

/// ZIP local file header signature.
const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";

/// ZIP end-of-central-directory signature (empty archive).
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Indexed format (ZIP).
    Zip,
    /// Sequential format (uncompressed TAR).
    Tar,
}

impl ContainerFormat {
    /// Selects the format from a file extension, ignoring case.
    ///
    /// ```rust
    /// use arcfold::ContainerFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(ContainerFormat::from_path(Path::new("A.ZIP")), Some(ContainerFormat::Zip));
    /// assert_eq!(ContainerFormat::from_path(Path::new("b.tar")), Some(ContainerFormat::Tar));
    /// assert_eq!(ContainerFormat::from_path(Path::new("c.txt")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("zip") {
            Some(Self::Zip)
        } else if ext.eq_ignore_ascii_case("tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Returns the canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
        }
    }

    /// Returns a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Zip => "ZIP",
            Self::Tar => "TAR",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies the format from the leading bytes of a file.
///
/// `head` should hold the first block of the file (512 bytes or the
/// whole file if shorter). Returns `None` when no signature matches.
pub fn sniff(head: &[u8]) -> Option<ContainerFormat> {
    if head.starts_with(ZIP_LOCAL_HEADER) || head.starts_with(ZIP_EMPTY_ARCHIVE) {
        return Some(ContainerFormat::Zip);
    }
    if head.len() >= TAR_BLOCK {
        let block = &head[..TAR_BLOCK];
        // An empty archive is nothing but end-of-archive zero blocks.
        if block.iter().all(|&b| b == 0) {
            return Some(ContainerFormat::Tar);
        }
        if &block[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar" || tar_checksum_ok(block) {
            return Some(ContainerFormat::Tar);
        }
    }
    None
}

/// Validates the header checksum of a pre-POSIX TAR block.
fn tar_checksum_ok(block: &[u8]) -> bool {
    let field = &block[148..156];
    let digits: String = field
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    let Ok(stored) = u32::from_str_radix(&digits, 8) else {
        return false;
    };
    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { 32 } else { u32::from(b) })
        .sum();
    stored == computed
}

/// Determines the format of the container at `path`.
///
/// The extension selects the format. For an existing file the leading bytes
/// must agree with it.
///
/// # Errors
///
/// - [`Error::NotAnArchive`] for an unknown extension, an empty file, or
///   content that does not match the extension
/// - [`Error::Io`] if the file cannot be read
pub fn detect(path: &Path) -> Result<ContainerFormat> {
    let format = ContainerFormat::from_path(path).ok_or_else(|| Error::NotAnArchive {
        path: path.display().to_string(),
        reason: "unsupported file extension (expected .zip or .tar)".into(),
    })?;

    let mut head = Vec::with_capacity(TAR_BLOCK);
    File::open(path)?
        .take(TAR_BLOCK as u64)
        .read_to_end(&mut head)?;

    if head.is_empty() {
        return Err(Error::NotAnArchive {
            path: path.display().to_string(),
            reason: "file is empty".into(),
        });
    }

    match sniff(&head) {
        Some(found) if found == format => Ok(format),
        Some(found) => Err(Error::NotAnArchive {
            path: path.display().to_string(),
            reason: format!("expected {format} data, found {found}"),
        }),
        None => Err(Error::NotAnArchive {
            path: path.display().to_string(),
            reason: format!("no {format} signature"),
        }),
    }
}

/// Returns the adapter for a format.
pub fn adapter_for(format: ContainerFormat) -> &'static dyn ContainerAdapter {
    match format {
        ContainerFormat::Zip => &ZipAdapter,
        ContainerFormat::Tar => &TarAdapter,
    }
}

/// Metadata recorded for a member being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberMeta {
    /// Exact number of payload bytes the source will yield.
    pub size: u64,
    /// Modification time to record.
    pub modified_at: Option<Timestamp>,
}

/// Outcome of [`ContainerAdapter::rebuild`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Members copied into the new container.
    pub kept: usize,
    /// Members left out.
    pub dropped: usize,
}

/// Format-specific container operations.
pub trait ContainerAdapter: Send + Sync + fmt::Debug {
    /// The format this adapter handles.
    fn format(&self) -> ContainerFormat;

    /// Writes a valid empty container at `path`, truncating any existing
    /// file.
    fn create_empty(&self, path: &Path) -> Result<()>;

    /// Opens a container for listing and payload reads.
    fn open_read(&self, path: &Path) -> Result<Box<dyn ContainerReader>>;

    /// Opens a container for appending members.
    ///
    /// `compression` applies to formats that support it.
    fn open_append(
        &self,
        path: &Path,
        compression: Compression,
    ) -> Result<Box<dyn ContainerWriter>>;

    /// Writes a new container at `target` holding every member of `source`
    /// for which `keep` returns true, in original order and byte-for-byte.
    fn rebuild(
        &self,
        source: &Path,
        target: &Path,
        keep: &mut dyn FnMut(&Member) -> bool,
    ) -> Result<RebuildStats>;
}

/// Read access to an open container.
pub trait ContainerReader {
    /// Lists every member in container order without reading payloads.
    fn list_members(&mut self) -> Result<Vec<Member>>;

    /// Streams one member's payload into `sink`, returning the byte count.
    fn copy_payload(&mut self, member: &Member, sink: &mut dyn Write) -> Result<u64>;

    /// Reads the payload of the first member whose path equals `path`.
    fn read_payload(&mut self, path: &str) -> Result<Vec<u8>> {
        let member = self
            .list_members()?
            .into_iter()
            .find(|m| m.path == path)
            .ok_or_else(|| Error::MemberNotFound {
                path: path.to_string(),
            })?;
        let mut buf = Vec::with_capacity(usize::try_from(member.size).unwrap_or(0));
        self.copy_payload(&member, &mut buf)?;
        Ok(buf)
    }
}

/// Append access to an open container.
///
/// Dropping a writer without calling [`finish`](Self::finish) still closes
/// the file, but may leave the container without its trailing index.
pub trait ContainerWriter {
    /// Appends a member whose payload is streamed from `source`.
    ///
    /// A failure part-way through rolls the member back so the container
    /// stays readable.
    fn write_member(
        &mut self,
        path: &MemberPath,
        source: &mut dyn Read,
        meta: &MemberMeta,
    ) -> Result<()>;

    /// Appends a zero-length folder marker.
    fn write_empty_marker(&mut self, path: &MemberPath) -> Result<()>;

    /// Writes the trailing index or end-of-archive blocks and closes the
    /// file.
    fn finish(self: Box<Self>) -> Result<()>;
}
