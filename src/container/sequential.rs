//! Sequential format (TAR) adapter.
//!
//! TAR has no index: listing walks the header blocks, seeking over each
//! payload. Every member therefore occupies a contiguous *span*, from the
//! first block after the previous member (including any long-name or PAX
//! extension headers) to the end of its zero-padded payload. Rebuilding
//! copies kept spans verbatim; appending truncates the end-of-archive
//! blocks after the last span and writes new members from there.

use super::{
    ContainerAdapter, ContainerFormat, ContainerReader, ContainerWriter, MemberMeta,
    RebuildStats,
};
use crate::member::{Member, PayloadRef};
use crate::member_path::MemberPath;
use crate::options::Compression;
use crate::timestamp::Timestamp;
use crate::{Error, Result};
use ::tar::{Archive, Builder, EntryType, Header};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const BLOCK: u64 = 512;

/// Two zero blocks terminate an archive.
const END_OF_ARCHIVE: [u8; 1024] = [0; 1024];

/// Adapter for the sequential container format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarAdapter;

impl ContainerAdapter for TarAdapter {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Tar
    }

    fn create_empty(&self, path: &Path) -> Result<()> {
        let mut builder = Builder::new(File::create(path)?);
        builder.finish()?;
        Ok(())
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn ContainerReader>> {
        let file = File::open(path)?;
        Ok(Box::new(TarContainerReader { file }))
    }

    fn open_append(
        &self,
        path: &Path,
        _compression: Compression,
    ) -> Result<Box<dyn ContainerWriter>> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let end = scan(&mut file)?.last().map_or(0, |span| span.end);
        file.set_len(end)?;
        file.seek(SeekFrom::Start(end))?;
        Ok(Box::new(TarContainerWriter {
            builder: Builder::new(file),
        }))
    }

    fn rebuild(
        &self,
        source: &Path,
        target: &Path,
        keep: &mut dyn FnMut(&Member) -> bool,
    ) -> Result<RebuildStats> {
        let mut input = File::open(source)?;
        let spans = scan(&mut input)?;
        let mut output = BufWriter::new(File::create(target)?);
        let mut stats = RebuildStats::default();

        for span in &spans {
            if keep(&span.member) {
                input.seek(SeekFrom::Start(span.start))?;
                let len = span.end - span.start;
                let copied = io::copy(&mut (&mut input).take(len), &mut output)?;
                if copied != len {
                    return Err(Error::InvalidArchive(format!(
                        "member '{}' is truncated",
                        span.member.path
                    )));
                }
                stats.kept += 1;
            } else {
                log::debug!("Dropping '{}' from rebuilt archive", span.member.path);
                stats.dropped += 1;
            }
        }

        output.write_all(&END_OF_ARCHIVE)?;
        output.flush()?;
        Ok(stats)
    }
}

/// One member and the byte range it occupies.
#[derive(Debug)]
struct Span {
    member: Member,
    start: u64,
    end: u64,
}

/// Walks every header of the archive without reading payloads.
fn scan(file: &mut File) -> Result<Vec<Span>> {
    let file_len = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;

    let mut archive = Archive::new(&mut *file);
    let mut spans = Vec::new();
    let mut start = 0u64;

    for entry in archive.entries_with_seek().map_err(corrupt)? {
        let entry = entry.map_err(corrupt)?;
        let header = entry.header();
        let entry_type = header.entry_type();
        if entry_type == EntryType::XGlobalHeader {
            // Global PAX records stay attached to the following member.
            continue;
        }

        let stored = header.entry_size().map_err(corrupt)?;
        let data_offset = entry.raw_file_position();
        let end = data_offset + round_up(stored);
        if data_offset + stored > file_len {
            return Err(Error::InvalidArchive(format!(
                "member data at offset {data_offset:#x} runs past end of file"
            )));
        }

        let mut path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if entry_type.is_dir() && !path.ends_with('/') {
            path.push('/');
        }
        let modified_at = header
            .mtime()
            .ok()
            .and_then(|secs| i64::try_from(secs).ok())
            .map(Timestamp::from_unix_secs);

        spans.push(Span {
            member: Member::new(
                path,
                entry.size(),
                modified_at,
                PayloadRef::Sequential {
                    header_offset: start,
                    data_offset,
                },
            ),
            start,
            end,
        });
        start = end;
    }
    Ok(spans)
}

fn round_up(size: u64) -> u64 {
    size.div_ceil(BLOCK) * BLOCK
}

fn corrupt(err: io::Error) -> Error {
    Error::InvalidArchive(format!("corrupt TAR header: {err}"))
}

struct TarContainerReader {
    file: File,
}

impl ContainerReader for TarContainerReader {
    fn list_members(&mut self) -> Result<Vec<Member>> {
        Ok(scan(&mut self.file)?
            .into_iter()
            .map(|span| span.member)
            .collect())
    }

    fn copy_payload(&mut self, member: &Member, sink: &mut dyn Write) -> Result<u64> {
        let PayloadRef::Sequential { data_offset, .. } = member.payload else {
            return Err(Error::InvalidArchive(format!(
                "'{}' does not belong to a TAR container",
                member.path
            )));
        };
        self.file.seek(SeekFrom::Start(data_offset))?;
        let copied = io::copy(&mut (&mut self.file).take(member.size), sink)?;
        if copied != member.size {
            return Err(Error::InvalidArchive(format!(
                "member '{}' is truncated",
                member.path
            )));
        }
        Ok(copied)
    }
}

struct TarContainerWriter {
    builder: Builder<File>,
}

impl TarContainerWriter {
    /// Truncates the file back to `pos`, discarding a partial member.
    fn rollback(&mut self, pos: u64, path: &MemberPath) {
        let file = self.builder.get_mut();
        if let Err(e) = file.set_len(pos).and_then(|_| file.seek(SeekFrom::Start(pos))) {
            log::warn!("Failed to roll back partial member '{}': {}", path, e);
        }
    }
}

impl ContainerWriter for TarContainerWriter {
    fn write_member(
        &mut self,
        path: &MemberPath,
        source: &mut dyn Read,
        meta: &MemberMeta,
    ) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(meta.size);
        header.set_mode(0o644);
        header.set_mtime(
            meta.modified_at
                .map_or(0, |ts| u64::try_from(ts.as_unix_secs()).unwrap_or(0)),
        );

        let pos = self.builder.get_mut().stream_position()?;
        let mut counted = CountingReader::new(source.take(meta.size));
        if let Err(e) = self.builder.append_data(&mut header, path.as_str(), &mut counted) {
            self.rollback(pos, path);
            return Err(e.into());
        }
        if counted.count != meta.size {
            self.rollback(pos, path);
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source for '{}' ended after {} of {} bytes",
                    path, counted.count, meta.size
                ),
            )));
        }
        Ok(())
    }

    fn write_empty_marker(&mut self, path: &MemberPath) -> Result<()> {
        debug_assert!(path.is_folder_marker());
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(u64::try_from(Timestamp::now().as_unix_secs()).unwrap_or(0));

        let pos = self.builder.get_mut().stream_position()?;
        if let Err(e) = self
            .builder
            .append_data(&mut header, path.as_str(), io::empty())
        {
            self.rollback(pos, path);
            return Err(e.into());
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let mut file = self.builder.into_inner()?;
        file.flush()?;
        Ok(())
    }
}

/// Counts bytes passing through a reader.
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
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

    fn append(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = TarAdapter.open_append(path, Compression::Stored).unwrap();
        for (name, body) in entries {
            writer
                .write_member(
                    &MemberPath::new(name).unwrap(),
                    &mut Cursor::new(*body),
                    &meta(body.len() as u64),
                )
                .unwrap();
        }
        writer.finish().unwrap();
    }

    fn paths(path: &Path) -> Vec<String> {
        TarAdapter
            .open_read(path)
            .unwrap()
            .list_members()
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect()
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0), 0);
        assert_eq!(round_up(1), 512);
        assert_eq!(round_up(512), 512);
        assert_eq!(round_up(513), 1024);
    }

    #[test]
    fn test_create_empty_is_two_zero_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8; 1024]);
        assert!(paths(&path).is_empty());
    }

    #[test]
    fn test_append_twice_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[("one.txt", b"1")]);
        append(&path, &[("two.txt", b"22"), ("sub/three.txt", b"333")]);
        assert_eq!(paths(&path), ["one.txt", "two.txt", "sub/three.txt"]);

        let mut reader = TarAdapter.open_read(&path).unwrap();
        assert_eq!(reader.read_payload("sub/three.txt").unwrap(), b"333");
    }

    #[test]
    fn test_metadata_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[("x.bin", &[7u8; 700])]);

        let members = TarAdapter.open_read(&path).unwrap().list_members().unwrap();
        assert_eq!(members[0].size, 700);
        assert_eq!(
            members[0].modified_at.map(|t| t.as_unix_secs()),
            Some(1_600_000_000)
        );
    }

    #[test]
    fn test_marker_gets_trailing_slash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        let mut writer = TarAdapter.open_append(&path, Compression::Stored).unwrap();
        writer
            .write_empty_marker(&MemberPath::new("notes/").unwrap())
            .unwrap();
        writer.finish().unwrap();
        assert_eq!(paths(&path), ["notes/"]);
    }

    #[test]
    fn test_duplicates_coexist_first_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[("x.txt", b"first")]);
        append(&path, &[("x.txt", b"second")]);
        assert_eq!(paths(&path), ["x.txt", "x.txt"]);

        let mut reader = TarAdapter.open_read(&path).unwrap();
        assert_eq!(reader.read_payload("x.txt").unwrap(), b"first");
    }

    #[test]
    fn test_long_path_survives_rebuild() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        let target = dir.path().join("b.tar");
        let long = format!("{}/file.txt", "d".repeat(150));
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[(long.as_str(), b"deep"), ("drop.txt", b"x")]);

        let stats = TarAdapter
            .rebuild(&path, &target, &mut |m: &Member| m.path != "drop.txt")
            .unwrap();
        assert_eq!(stats, RebuildStats { kept: 1, dropped: 1 });
        assert_eq!(paths(&target), [long.clone()]);

        let mut reader = TarAdapter.open_read(&target).unwrap();
        assert_eq!(reader.read_payload(&long).unwrap(), b"deep");
    }

    #[test]
    fn test_short_source_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[("keep.txt", b"keep")]);

        let mut writer = TarAdapter.open_append(&path, Compression::Stored).unwrap();
        let err = writer
            .write_member(
                &MemberPath::new("short.bin").unwrap(),
                &mut Cursor::new(b"abc"),
                &meta(4096),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        writer.finish().unwrap();

        assert_eq!(paths(&path), ["keep.txt"]);
    }

    #[test]
    fn test_truncated_archive_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar");
        TarAdapter.create_empty(&path).unwrap();
        append(&path, &[("big.bin", &[1u8; 4096])]);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..2048]).unwrap();

        let err = TarAdapter.open_read(&path).unwrap().list_members().unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)));
    }
}
