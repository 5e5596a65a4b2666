//! Raw walk of a ZIP central directory.
//!
//! The `zip` crate indexes entries by name, so an archive that stores one
//! name twice exposes a single entry through it. [`CentralDirectory`] reads
//! every record in directory order and keeps the raw record bytes, which is
//! enough to list shadowed entries, locate their local headers, and copy a
//! subset of them into a new archive unchanged.

use crate::{Error, Result};
use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;

/// End-of-central-directory record signature.
const EOCD_SIGNATURE: u32 = 0x0605_4b50;

/// Fixed size of the end-of-central-directory record.
const EOCD_LEN: usize = 22;

/// Largest archive comment.
const MAX_COMMENT_LEN: usize = 0xFFFF;

/// ZIP64 end-of-central-directory locator signature.
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;

/// Fixed size of the ZIP64 locator.
const ZIP64_LOCATOR_LEN: u64 = 20;

/// ZIP64 end-of-central-directory record signature.
const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;

/// Fixed part of the ZIP64 end-of-central-directory record.
const ZIP64_EOCD_LEN: usize = 56;

/// Central directory file header signature.
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;

/// Fixed part of a central directory file header.
const CENTRAL_FIXED_LEN: usize = 46;

/// Offset of the local header offset inside a central record.
const LOCAL_OFFSET_FIELD: usize = 42;

/// Extra field id of the ZIP64 extended information.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// A 32-bit field value meaning "see the ZIP64 extra field".
const ZIP64_MARKER: u32 = 0xFFFF_FFFF;

/// One central directory record.
#[derive(Debug, Clone)]
pub(super) struct CentralRecord {
    /// Decoded member name.
    pub name: String,
    /// Uncompressed size.
    pub size: u64,
    /// MS-DOS modification time field.
    pub dos_time: u16,
    /// MS-DOS modification date field.
    pub dos_date: u16,
    /// Absolute file offset of the local file header.
    pub header_offset: u64,
    /// The record exactly as stored.
    raw: Vec<u8>,
    /// Range of the name bytes inside `raw`.
    name_range: Range<usize>,
    /// The local header offset lives in the ZIP64 extra field.
    offset_in_extra: bool,
}

impl CentralRecord {
    /// Raw name bytes, compared before any decoding.
    fn name_bytes(&self) -> &[u8] {
        &self.raw[self.name_range.clone()]
    }

    /// Splits the DOS date and time fields into calendar parts.
    pub fn dos_fields(&self) -> (u16, u8, u8, u8, u8, u8) {
        let (date, time) = (self.dos_date, self.dos_time);
        (
            1980 + (date >> 9),
            ((date >> 5) & 0x0F) as u8,
            (date & 0x1F) as u8,
            (time >> 11) as u8,
            ((time >> 5) & 0x3F) as u8,
            ((time & 0x1F) * 2) as u8,
        )
    }
}

/// Every record of a ZIP central directory, in directory order.
#[derive(Debug, Clone)]
pub(super) struct CentralDirectory {
    /// Records in directory order.
    pub records: Vec<CentralRecord>,
    /// Absolute offset of the first record.
    start: u64,
    /// Archive comment.
    comment: Vec<u8>,
    /// The end record was a ZIP64 one.
    zip64: bool,
}

impl CentralDirectory {
    /// Reads the central directory of the archive behind `reader`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArchive`] if the end record or any directory record
    ///   is missing or malformed
    /// - [`Error::Io`] if reading fails
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < EOCD_LEN as u64 {
            return Err(invalid(
                "file is too short to hold an end-of-central-directory record",
            ));
        }

        let tail_len = file_len.min((EOCD_LEN + MAX_COMMENT_LEN) as u64);
        let tail_start = file_len - tail_len;
        reader.seek(SeekFrom::Start(tail_start))?;
        let mut tail = vec![0u8; tail_len as usize];
        reader.read_exact(&mut tail)?;

        let at = (0..=tail.len() - EOCD_LEN)
            .rev()
            .find(|&i| {
                le_u32(&tail, i) == EOCD_SIGNATURE
                    && i + EOCD_LEN + usize::from(le_u16(&tail, i + 20)) <= tail.len()
            })
            .ok_or_else(|| invalid("end-of-central-directory record not found"))?;
        let eocd_pos = tail_start + at as u64;
        let comment_len = usize::from(le_u16(&tail, at + 20));
        let comment = tail[at + EOCD_LEN..at + EOCD_LEN + comment_len].to_vec();

        let declared = u64::from(le_u16(&tail, at + 10));
        let mut size = u64::from(le_u32(&tail, at + 12));
        let mut offset = u64::from(le_u32(&tail, at + 16));
        let zip64 = declared == 0xFFFF
            || size == u64::from(ZIP64_MARKER)
            || offset == u64::from(ZIP64_MARKER);

        // Data prepended to the archive shifts every recorded offset.
        let prefix = if zip64 {
            (size, offset) = read_zip64_end(reader, eocd_pos)?;
            0
        } else {
            eocd_pos
                .checked_sub(offset + size)
                .ok_or_else(|| invalid("central directory overlaps its end record"))?
        };
        let start = offset + prefix;
        if start + size > file_len {
            return Err(invalid("central directory extends past the end of the file"));
        }

        reader.seek(SeekFrom::Start(start))?;
        let len = usize::try_from(size).map_err(|_| invalid("central directory too large"))?;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;

        let mut records = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            let record = parse_record(&buf, pos, prefix)?;
            if record.header_offset >= start {
                return Err(invalid(format!(
                    "local header of '{}' lies inside the central directory",
                    record.name
                )));
            }
            pos += record.raw.len();
            records.push(record);
        }
        if declared != 0xFFFF && declared != records.len() as u64 {
            log::debug!(
                "End record declares {} entries, central directory holds {}",
                declared,
                records.len()
            );
        }

        Ok(Self {
            records,
            start,
            comment,
            zip64,
        })
    }

    /// Returns true if two records share a name.
    pub fn has_duplicate_names(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.records.len());
        self.records.iter().any(|r| !seen.insert(r.name_bytes()))
    }

    /// Local header offsets in ascending order.
    fn sorted_offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self.records.iter().map(|r| r.header_offset).collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    /// Byte range of the local entry (header, data and any descriptor) that
    /// starts at `begin`. It runs up to the next local header, or to the
    /// central directory for the last entry.
    fn span(&self, sorted: &[u64], begin: u64) -> Range<u64> {
        let next = sorted.partition_point(|&offset| offset <= begin);
        begin..sorted.get(next).copied().unwrap_or(self.start)
    }

    /// Fails if the directory cannot be rewritten without ZIP64 records.
    pub fn ensure_rewritable(&self) -> Result<()> {
        if self.zip64 || self.records.iter().any(|r| r.offset_in_extra) {
            return Err(invalid(
                "rewriting a ZIP64 archive that stores duplicate names is not supported",
            ));
        }
        Ok(())
    }

    /// Copies the local entries of the records for which `keep[i]` is true
    /// from `source` into `target`, then writes a matching central directory
    /// and end record. Entry bytes are copied unchanged; only the local header
    /// offsets in the directory are updated.
    pub fn write_subset<R, W>(&self, source: &mut R, target: &mut W, keep: &[bool]) -> Result<()>
    where
        R: Read + Seek,
        W: Write,
    {
        self.ensure_rewritable()?;

        let sorted = self.sorted_offsets();
        let mut written: u64 = 0;
        let mut directory = Vec::new();
        let mut count: usize = 0;
        for (index, record) in self.records.iter().enumerate() {
            if !keep.get(index).copied().unwrap_or(false) {
                continue;
            }
            let span = self.span(&sorted, record.header_offset);
            let len = span.end - span.start;
            source.seek(SeekFrom::Start(span.start))?;
            let copied = io::copy(&mut source.by_ref().take(len), target)?;
            if copied != len {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("entry '{}' ended after {} of {} bytes", record.name, copied, len),
                )));
            }

            let new_offset = u32::try_from(written)
                .ok()
                .filter(|&o| o != ZIP64_MARKER)
                .ok_or_else(|| invalid("rebuilt archive needs ZIP64 offsets"))?;
            let mut raw = record.raw.clone();
            raw[LOCAL_OFFSET_FIELD..LOCAL_OFFSET_FIELD + 4]
                .copy_from_slice(&new_offset.to_le_bytes());
            directory.extend_from_slice(&raw);
            written += copied;
            count += 1;
        }

        let entries = u16::try_from(count)
            .ok()
            .filter(|&n| n != 0xFFFF)
            .ok_or_else(|| invalid("rebuilt archive needs a ZIP64 entry count"))?;
        let directory_len = u32::try_from(directory.len())
            .map_err(|_| invalid("rebuilt central directory needs ZIP64"))?;
        let directory_offset = u32::try_from(written)
            .ok()
            .filter(|&o| o != ZIP64_MARKER)
            .ok_or_else(|| invalid("rebuilt archive needs ZIP64 offsets"))?;
        let comment_len = u16::try_from(self.comment.len())
            .map_err(|_| invalid("archive comment too long"))?;

        target.write_all(&directory)?;
        let mut end = Vec::with_capacity(EOCD_LEN + self.comment.len());
        end.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        end.extend_from_slice(&0u16.to_le_bytes());
        end.extend_from_slice(&0u16.to_le_bytes());
        end.extend_from_slice(&entries.to_le_bytes());
        end.extend_from_slice(&entries.to_le_bytes());
        end.extend_from_slice(&directory_len.to_le_bytes());
        end.extend_from_slice(&directory_offset.to_le_bytes());
        end.extend_from_slice(&comment_len.to_le_bytes());
        end.extend_from_slice(&self.comment);
        target.write_all(&end)?;
        Ok(())
    }
}

/// Reads the directory size and offset from the ZIP64 end record.
fn read_zip64_end<R: Read + Seek>(reader: &mut R, eocd_pos: u64) -> Result<(u64, u64)> {
    let locator_pos = eocd_pos
        .checked_sub(ZIP64_LOCATOR_LEN)
        .ok_or_else(|| invalid("ZIP64 locator missing"))?;
    reader.seek(SeekFrom::Start(locator_pos))?;
    let mut locator = [0u8; ZIP64_LOCATOR_LEN as usize];
    reader.read_exact(&mut locator)?;
    if le_u32(&locator, 0) != ZIP64_LOCATOR_SIGNATURE {
        return Err(invalid("ZIP64 locator missing"));
    }

    reader.seek(SeekFrom::Start(le_u64(&locator, 8)))?;
    let mut end = [0u8; ZIP64_EOCD_LEN];
    reader.read_exact(&mut end)?;
    if le_u32(&end, 0) != ZIP64_EOCD_SIGNATURE {
        return Err(invalid("ZIP64 end-of-central-directory record missing"));
    }
    Ok((le_u64(&end, 40), le_u64(&end, 48)))
}

/// Parses the central record starting at `pos`.
fn parse_record(buf: &[u8], pos: usize, prefix: u64) -> Result<CentralRecord> {
    if pos + CENTRAL_FIXED_LEN > buf.len() || le_u32(buf, pos) != CENTRAL_SIGNATURE {
        return Err(invalid(format!("bad central directory record at offset {pos}")));
    }
    let name_len = usize::from(le_u16(buf, pos + 28));
    let extra_len = usize::from(le_u16(buf, pos + 30));
    let comment_len = usize::from(le_u16(buf, pos + 32));
    let record_len = CENTRAL_FIXED_LEN + name_len + extra_len + comment_len;
    if pos + record_len > buf.len() {
        return Err(invalid(format!("truncated central directory record at offset {pos}")));
    }
    let raw = buf[pos..pos + record_len].to_vec();

    let name_range = CENTRAL_FIXED_LEN..CENTRAL_FIXED_LEN + name_len;
    let name_bytes = &raw[name_range.clone()];
    // Legacy CP437 names share the ASCII subset with UTF-8.
    let name = String::from_utf8_lossy(name_bytes).into_owned();

    let compressed = le_u32(&raw, 20);
    let uncompressed = le_u32(&raw, 24);
    let local = le_u32(&raw, LOCAL_OFFSET_FIELD);
    let mut size = u64::from(uncompressed);
    let mut header_offset = u64::from(local);

    // ZIP64 values appear in a fixed order, only for fields set to the marker.
    let extra = &raw[name_range.end..name_range.end + extra_len];
    let mut at = 0;
    while at + 4 <= extra.len() {
        let id = le_u16(extra, at);
        let len = usize::from(le_u16(extra, at + 2));
        let body = &extra[(at + 4).min(extra.len())..(at + 4 + len).min(extra.len())];
        if id == ZIP64_EXTRA_ID {
            let mut values = body.chunks_exact(8).map(|c| le_u64(c, 0));
            if uncompressed == ZIP64_MARKER {
                size = values.next().unwrap_or(size);
            }
            if compressed == ZIP64_MARKER {
                values.next();
            }
            if local == ZIP64_MARKER {
                header_offset = values.next().unwrap_or(header_offset);
            }
        }
        at += 4 + len;
    }

    Ok(CentralRecord {
        name,
        size,
        dos_time: le_u16(&raw, 12),
        dos_date: le_u16(&raw, 14),
        header_offset: header_offset + prefix,
        raw,
        name_range,
        offset_in_extra: local == ZIP64_MARKER,
    })
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    u64::from(le_u32(buf, at)) | (u64::from(le_u32(buf, at + 4)) << 32)
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidArchive(reason.into())
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use ::zip::write::SimpleFileOptions;
    use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
    use std::io::Cursor;

    /// Overwrites every occurrence of `from` with the same-length `to`.
    fn rename_all(bytes: &mut [u8], from: &[u8], to: &[u8]) {
        assert_eq!(from.len(), to.len());
        let mut i = 0;
        while i + from.len() <= bytes.len() {
            if &bytes[i..i + from.len()] == from {
                bytes[i..i + from.len()].copy_from_slice(to);
                i += from.len();
            } else {
                i += 1;
            }
        }
    }

    /// `notes/`, `a.txt`="first", `notes/`, `a.txt`="second", `b.txt`="bee".
    pub(in crate::container) fn repeated_names() -> Vec<u8> {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("notes/", stored).unwrap();
        writer.start_file("a.txt", stored).unwrap();
        writer.write_all(b"first").unwrap();
        writer.add_directory("notez/", stored).unwrap();
        writer.start_file("a.txz", stored).unwrap();
        writer.write_all(b"second").unwrap();
        writer.start_file("b.txt", stored).unwrap();
        writer.write_all(b"bee").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();
        rename_all(&mut bytes, b"notez/", b"notes/");
        rename_all(&mut bytes, b"a.txz", b"a.txt");
        bytes
    }

    fn names(directory: &CentralDirectory) -> Vec<&str> {
        directory.records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_walk_sees_every_record() {
        let directory = CentralDirectory::read(&mut Cursor::new(repeated_names())).unwrap();
        assert_eq!(names(&directory), ["notes/", "a.txt", "notes/", "a.txt", "b.txt"]);
        assert!(directory.has_duplicate_names());
        assert_eq!(directory.records[3].size, 6);
    }

    #[test]
    fn test_unique_names_not_flagged() {
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("x", stored).unwrap();
        writer.start_file("y", stored).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let directory = CentralDirectory::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(names(&directory), ["x", "y"]);
        assert!(!directory.has_duplicate_names());
    }

    #[test]
    fn test_prefixed_archive_offsets_shift() {
        let mut bytes = b"#!stub\n".to_vec();
        bytes.extend(repeated_names());
        let directory = CentralDirectory::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(directory.records[0].header_offset, 7);
    }

    #[test]
    fn test_write_subset_keeps_shadowed_entries() {
        let bytes = repeated_names();
        let directory = CentralDirectory::read(&mut Cursor::new(bytes.clone())).unwrap();

        let mut out = Vec::new();
        directory
            .write_subset(&mut Cursor::new(bytes), &mut out, &[true, true, true, true, false])
            .unwrap();

        let rebuilt = CentralDirectory::read(&mut Cursor::new(out.clone())).unwrap();
        assert_eq!(names(&rebuilt), ["notes/", "a.txt", "notes/", "a.txt"]);
        // The rebuilt bytes still form an archive the zip crate accepts.
        assert!(ZipArchive::new(Cursor::new(out)).is_ok());
    }

    #[test]
    fn test_missing_end_record() {
        let err = CentralDirectory::read(&mut Cursor::new(vec![0u8; 64])).unwrap_err();
        assert!(matches!(err, Error::InvalidArchive(_)));
    }

    #[test]
    fn test_dos_fields_split() {
        let directory = CentralDirectory::read(&mut Cursor::new(repeated_names())).unwrap();
        let record = CentralRecord {
            dos_date: (44 << 9) | (3 << 5) | 1,
            dos_time: (12 << 11) | (30 << 5) | 7,
            ..directory.records[0].clone()
        };
        assert_eq!(record.dos_fields(), (2024, 3, 1, 12, 30, 14));
    }
}
