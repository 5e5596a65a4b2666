//! Indexed format (ZIP) adapter.
//!
//! Listing reads only the central directory. Appending reopens the file
//! with [`ZipWriter::new_append`], which keeps existing members untouched
//! and rewrites the central directory on finish. Rebuilding copies kept
//! members with [`ZipWriter::raw_copy_file`], so their compressed bytes and
//! headers are never recompressed.
//!
//! The `zip` crate keeps one entry per name. Archives written by other tools
//! may store a name more than once, so every open first walks the central
//! directory itself ([`CentralDirectory`]). When a name repeats:
//! - listing and reads go through the walked records, so every copy is
//!   visible and reads by path return the first one;
//! - rebuilding copies the raw local entries of kept records and writes a
//!   fresh central directory;
//! - appending is refused, since `new_append` would rewrite the directory
//!   without the shadowed copies.

use super::central::CentralDirectory;
use super::{
    ContainerAdapter, ContainerFormat, ContainerReader, ContainerWriter, MemberMeta,
    RebuildStats,
};
use crate::member::{Member, PayloadRef};
use crate::member_path::MemberPath;
use crate::options::Compression;
use crate::timestamp::Timestamp;
use crate::{Error, Result};
use ::zip::result::ZipError;
use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Payloads at or above this size need ZIP64 extra fields.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Adapter for the indexed container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipAdapter;

impl ContainerAdapter for ZipAdapter {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Zip
    }

    fn create_empty(&self, path: &Path) -> Result<()> {
        let writer = ZipWriter::new(File::create(path)?);
        writer.finish().map_err(map_zip_error)?;
        Ok(())
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn ContainerReader>> {
        let mut file = BufReader::new(File::open(path)?);
        let directory = CentralDirectory::read(&mut file)?;
        if directory.has_duplicate_names() {
            log::debug!(
                "'{}' stores duplicate names, reading through its raw central directory",
                path.display()
            );
            return Ok(Box::new(ZipContainerReader::Walked { file, directory }));
        }
        let archive = ZipArchive::new(file).map_err(map_zip_error)?;
        Ok(Box::new(ZipContainerReader::Indexed(archive)))
    }

    fn open_append(
        &self,
        path: &Path,
        compression: Compression,
    ) -> Result<Box<dyn ContainerWriter>> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        if CentralDirectory::read(&mut file)?.has_duplicate_names() {
            return Err(Error::InvalidArchive(format!(
                "'{}' stores duplicate member names; appending would drop the shadowed copies",
                path.display()
            )));
        }
        // The writer does not expose stored names, so collect them first.
        let names: HashSet<String> = open_archive(path)?
            .file_names()
            .map(str::to_string)
            .collect();
        file.seek(SeekFrom::Start(0))?;
        let writer = ZipWriter::new_append(file).map_err(map_zip_error)?;
        Ok(Box::new(ZipContainerWriter {
            writer,
            names,
            method: compression_method(compression),
        }))
    }

    fn rebuild(
        &self,
        source: &Path,
        target: &Path,
        keep: &mut dyn FnMut(&Member) -> bool,
    ) -> Result<RebuildStats> {
        let mut input = BufReader::new(File::open(source)?);
        let directory = CentralDirectory::read(&mut input)?;
        if directory.has_duplicate_names() {
            return rebuild_walked(&directory, &mut input, target, keep);
        }

        let mut archive = ZipArchive::new(input).map_err(map_zip_error)?;
        let mut writer = ZipWriter::new(BufWriter::new(File::create(target)?));
        let mut stats = RebuildStats::default();

        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(map_zip_error)?;
            let member = member_from(
                file.name(),
                file.size(),
                Option::<::zip::DateTime>::from(file.last_modified()),
                index,
            );
            if keep(&member) {
                writer.raw_copy_file(file).map_err(map_zip_error)?;
                stats.kept += 1;
            } else {
                log::debug!("Dropping '{}' from rebuilt archive", member.path);
                stats.dropped += 1;
            }
        }

        let buffered = writer.finish().map_err(map_zip_error)?;
        let mut file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.flush()?;
        Ok(stats)
    }
}

/// Rebuilds an archive whose names repeat by copying raw local entries.
fn rebuild_walked(
    directory: &CentralDirectory,
    input: &mut BufReader<File>,
    target: &Path,
    keep: &mut dyn FnMut(&Member) -> bool,
) -> Result<RebuildStats> {
    directory.ensure_rewritable()?;

    let mut stats = RebuildStats::default();
    let selected: Vec<bool> = walked_members(directory)
        .map(|member| {
            let kept = keep(&member);
            if kept {
                stats.kept += 1;
            } else {
                log::debug!("Dropping '{}' from rebuilt archive", member.path);
                stats.dropped += 1;
            }
            kept
        })
        .collect();

    let mut output = BufWriter::new(File::create(target)?);
    directory.write_subset(input, &mut output, &selected)?;
    let mut file = output.into_inner().map_err(|e| e.into_error())?;
    file.flush()?;
    Ok(stats)
}

/// Members of a walked central directory, indexed by record position.
fn walked_members(directory: &CentralDirectory) -> impl Iterator<Item = Member> + '_ {
    directory.records.iter().enumerate().map(|(index, record)| {
        let (year, month, day, hour, minute, second) = record.dos_fields();
        let modified_at = Timestamp::from_dos_fields(year, month, day, hour, minute, second);
        Member::new(
            record.name.as_str(),
            record.size,
            modified_at,
            PayloadRef::Indexed { index },
        )
    })
}

enum ZipContainerReader {
    /// Every name is unique, so the `zip` crate's index covers every entry.
    Indexed(ZipArchive<BufReader<File>>),
    /// Some name repeats; entries are addressed through the raw directory.
    Walked {
        file: BufReader<File>,
        directory: CentralDirectory,
    },
}

impl ContainerReader for ZipContainerReader {
    fn list_members(&mut self) -> Result<Vec<Member>> {
        let archive = match self {
            Self::Indexed(archive) => archive,
            Self::Walked { directory, .. } => return Ok(walked_members(directory).collect()),
        };
        let mut members = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(map_zip_error)?;
            members.push(member_from(
                file.name(),
                file.size(),
                Option::<::zip::DateTime>::from(file.last_modified()),
                index,
            ));
        }
        Ok(members)
    }

    fn copy_payload(&mut self, member: &Member, sink: &mut dyn Write) -> Result<u64> {
        let PayloadRef::Indexed { index } = member.payload else {
            return Err(Error::InvalidArchive(format!(
                "'{}' does not belong to a ZIP container",
                member.path
            )));
        };
        match self {
            Self::Indexed(archive) => {
                let mut file = archive.by_index(index).map_err(map_zip_error)?;
                Ok(io::copy(&mut file, sink)?)
            }
            Self::Walked { file, directory } => {
                let record = directory.records.get(index).ok_or_else(|| {
                    Error::InvalidArchive(format!("no central record #{index}"))
                })?;
                file.seek(SeekFrom::Start(record.header_offset))?;
                let mut entry = ::zip::read::read_zipfile_from_stream(file)
                    .map_err(map_zip_error)?
                    .ok_or_else(|| {
                        Error::InvalidArchive(format!(
                            "no local header for '{}' at offset {}",
                            record.name, record.header_offset
                        ))
                    })?;
                Ok(io::copy(&mut entry, sink)?)
            }
        }
    }
}

struct ZipContainerWriter {
    writer: ZipWriter<File>,
    names: HashSet<String>,
    method: CompressionMethod,
}

impl ZipContainerWriter {
    fn check_unique(&self, path: &MemberPath) -> Result<()> {
        if self.names.contains(path.as_str()) {
            return Err(Error::EntryExists {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

impl ContainerWriter for ZipContainerWriter {
    fn write_member(
        &mut self,
        path: &MemberPath,
        source: &mut dyn Read,
        meta: &MemberMeta,
    ) -> Result<()> {
        self.check_unique(path)?;

        let mut options = SimpleFileOptions::default()
            .compression_method(self.method)
            .large_file(meta.size >= ZIP64_THRESHOLD);
        if let Some(dt) = meta.modified_at.and_then(to_zip_datetime) {
            options = options.last_modified_time(dt);
        }

        self.writer
            .start_file(path.as_str(), options)
            .map_err(map_zip_error)?;

        let copied = match io::copy(&mut source.take(meta.size), &mut self.writer) {
            Ok(n) => n,
            Err(e) => {
                self.abort(path);
                return Err(e.into());
            }
        };
        if copied != meta.size {
            self.abort(path);
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source for '{}' ended after {} of {} bytes",
                    path, copied, meta.size
                ),
            )));
        }

        self.names.insert(path.to_string());
        Ok(())
    }

    fn write_empty_marker(&mut self, path: &MemberPath) -> Result<()> {
        debug_assert!(path.is_folder_marker());
        self.check_unique(path)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer
            .add_directory(path.as_str(), options)
            .map_err(map_zip_error)?;
        self.names.insert(path.to_string());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let mut file = self.writer.finish().map_err(map_zip_error)?;
        file.flush()?;
        Ok(())
    }
}

impl ZipContainerWriter {
    fn abort(&mut self, path: &MemberPath) {
        if let Err(e) = self.writer.abort_file() {
            log::warn!("Failed to roll back partial member '{}': {}", path, e);
        }
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let reader = BufReader::new(File::open(path)?);
    ZipArchive::new(reader).map_err(map_zip_error)
}

fn member_from(
    name: &str,
    size: u64,
    modified: Option<::zip::DateTime>,
    index: usize,
) -> Member {
    let modified_at = modified.and_then(|dt| {
        Timestamp::from_dos_fields(
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
        )
    });
    Member::new(name, size, modified_at, PayloadRef::Indexed { index })
}

fn to_zip_datetime(ts: Timestamp) -> Option<::zip::DateTime> {
    let (year, month, day, hour, minute, second) = ts.to_dos_fields();
    ::zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).ok()
}

fn compression_method(compression: Compression) -> CompressionMethod {
    match compression {
        Compression::Stored => CompressionMethod::Stored,
        #[cfg(feature = "deflate")]
        Compression::Deflated => CompressionMethod::Deflated,
        #[cfg(not(feature = "deflate"))]
        Compression::Deflated => CompressionMethod::Stored,
    }
}

fn map_zip_error(err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::Io(e),
        other => Error::InvalidArchive(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn meta(size: u64) -> MemberMeta {
        MemberMeta {
            size,
            modified_at: Some(Timestamp::from_unix_secs(1_600_000_000)),
        }
    }

    #[test]
    fn test_create_empty_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        ZipAdapter.create_empty(&path).unwrap();
        let mut reader = ZipAdapter.open_read(&path).unwrap();
        assert!(reader.list_members().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        ZipAdapter.create_empty(&path).unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Deflated).unwrap();
        let member = MemberPath::new("docs/x.txt").unwrap();
        writer
            .write_member(&member, &mut Cursor::new(b"0123456789"), &meta(10))
            .unwrap();
        writer.finish().unwrap();

        let mut reader = ZipAdapter.open_read(&path).unwrap();
        let members = reader.list_members().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].path, "docs/x.txt");
        assert_eq!(members[0].size, 10);
        let ts = members[0].modified_at.unwrap();
        assert_eq!(ts.as_unix_secs(), 1_600_000_000);
        assert_eq!(reader.read_payload("docs/x.txt").unwrap(), b"0123456789");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        ZipAdapter.create_empty(&path).unwrap();
        let name = MemberPath::new("x.txt").unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Stored).unwrap();
        writer
            .write_member(&name, &mut Cursor::new(b"a"), &meta(1))
            .unwrap();
        writer.finish().unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Stored).unwrap();
        let err = writer
            .write_member(&name, &mut Cursor::new(b"b"), &meta(1))
            .unwrap_err();
        assert!(matches!(err, Error::EntryExists { .. }));
        writer.finish().unwrap();

        let mut reader = ZipAdapter.open_read(&path).unwrap();
        assert_eq!(reader.list_members().unwrap().len(), 1);
    }

    #[test]
    fn test_short_source_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        ZipAdapter.create_empty(&path).unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Stored).unwrap();
        let err = writer
            .write_member(
                &MemberPath::new("short.bin").unwrap(),
                &mut Cursor::new(b"abc"),
                &meta(10),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        writer.finish().unwrap();

        let mut reader = ZipAdapter.open_read(&path).unwrap();
        assert!(reader.list_members().unwrap().is_empty());
    }

    #[test]
    fn test_marker_written_as_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        ZipAdapter.create_empty(&path).unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Stored).unwrap();
        writer
            .write_empty_marker(&MemberPath::new("notes/").unwrap())
            .unwrap();
        writer.finish().unwrap();

        let mut reader = ZipAdapter.open_read(&path).unwrap();
        let members = reader.list_members().unwrap();
        assert_eq!(members[0].path, "notes/");
        assert_eq!(members[0].size, 0);
    }

    #[test]
    fn test_rebuild_filters_members() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let target = dir.path().join("b.zip");
        ZipAdapter.create_empty(&path).unwrap();

        let mut writer = ZipAdapter.open_append(&path, Compression::Deflated).unwrap();
        for (name, body) in [("a.txt", &b"alpha"[..]), ("b.txt", b"beta"), ("c.txt", b"gamma")] {
            writer
                .write_member(
                    &MemberPath::new(name).unwrap(),
                    &mut Cursor::new(body),
                    &meta(body.len() as u64),
                )
                .unwrap();
        }
        writer.finish().unwrap();

        let stats = ZipAdapter
            .rebuild(&path, &target, &mut |m: &Member| m.path != "b.txt")
            .unwrap();
        assert_eq!(stats, RebuildStats { kept: 2, dropped: 1 });

        let mut reader = ZipAdapter.open_read(&target).unwrap();
        let paths: Vec<_> = reader
            .list_members()
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(paths, ["a.txt", "c.txt"]);
        assert_eq!(reader.read_payload("c.txt").unwrap(), b"gamma");
    }

    fn write_repeated_names(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("repeated.zip");
        std::fs::write(&path, crate::container::central::tests::repeated_names()).unwrap();
        path
    }

    #[test]
    fn test_repeated_names_listed_first_wins() {
        let dir = TempDir::new().unwrap();
        let path = write_repeated_names(&dir);

        let mut reader = ZipAdapter.open_read(&path).unwrap();
        let members = reader.list_members().unwrap();
        let paths: Vec<_> = members.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, ["notes/", "a.txt", "notes/", "a.txt", "b.txt"]);
        assert_eq!(reader.read_payload("a.txt").unwrap(), b"first");

        let mut second = Vec::new();
        reader.copy_payload(&members[3], &mut second).unwrap();
        assert_eq!(second, b"second");
    }

    #[test]
    fn test_rebuild_keeps_shadowed_copies() {
        let dir = TempDir::new().unwrap();
        let path = write_repeated_names(&dir);
        let target = dir.path().join("out.zip");

        let stats = ZipAdapter
            .rebuild(&path, &target, &mut |m: &Member| m.path != "b.txt")
            .unwrap();
        assert_eq!(stats, RebuildStats { kept: 4, dropped: 1 });

        let mut reader = ZipAdapter.open_read(&target).unwrap();
        let members = reader.list_members().unwrap();
        let mut bodies = Vec::new();
        for member in &members {
            let mut body = Vec::new();
            reader.copy_payload(member, &mut body).unwrap();
            bodies.push((member.path.clone(), body));
        }
        assert_eq!(
            bodies,
            [
                ("notes/".to_string(), Vec::new()),
                ("a.txt".to_string(), b"first".to_vec()),
                ("notes/".to_string(), Vec::new()),
                ("a.txt".to_string(), b"second".to_vec()),
            ]
        );
    }

    #[test]
    fn test_append_refused_when_names_repeat() {
        let dir = TempDir::new().unwrap();
        let path = write_repeated_names(&dir);
        let before = std::fs::read(&path).unwrap();

        let err = ZipAdapter
            .open_append(&path, Compression::Stored)
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArchive(_)));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_garbage_is_invalid_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.zip");
        std::fs::write(&path, b"PK\x03\x04 definitely not a zip").unwrap();
        assert!(matches!(
            ZipAdapter.open_read(&path),
            Err(Error::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_compression_method_selection() {
        assert_eq!(
            compression_method(Compression::Stored),
            CompressionMethod::Stored
        );
        #[cfg(feature = "deflate")]
        assert_eq!(
            compression_method(Compression::Deflated),
            CompressionMethod::Deflated
        );
    }
}
