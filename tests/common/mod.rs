//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use arcfold::{Container, ContainerFormat, Engine, EngineOptions};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Both supported container formats.
pub const FORMATS: [ContainerFormat; 2] = [ContainerFormat::Zip, ContainerFormat::Tar];

/// Returns `dir/<stem>.<ext>` for the given format.
pub fn archive_path(dir: &Path, stem: &str, format: ContainerFormat) -> PathBuf {
    dir.join(format!("{}.{}", stem, format.extension()))
}

/// Writes `data` to `dir/rel`, creating parent directories.
pub fn write_source(dir: &Path, rel: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create source directory");
    }
    fs::write(&path, data).expect("Failed to write source file");
    path
}

/// Generates deterministic pseudo-random bytes.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Creates an archive in `dir` holding `entries` at the given member paths.
///
/// Entries are added folder by folder through the engine, so the member
/// order matches the order of `entries` only within each folder.
pub fn create_archive_with(
    dir: &Path,
    format: ContainerFormat,
    entries: &[(&str, &[u8])],
) -> Container {
    let container =
        Container::create(archive_path(dir, "test", format)).expect("Failed to create archive");
    let engine = Engine::new(EngineOptions::default());
    let staging = TempDir::new().expect("Failed to create staging dir");

    for (i, (path, data)) in entries.iter().enumerate() {
        let (folder, name) = match path.rfind('/') {
            Some(pos) => (&path[..=pos], &path[pos + 1..]),
            None => ("", *path),
        };
        let source = write_source(&staging.path().join(i.to_string()), name, data);
        let report = engine
            .add_files(&container, folder, &[source])
            .expect("Failed to add entry");
        assert!(report.is_ok(), "Failed to add {}: {:?}", path, report.failures);
    }

    container
}

/// Reads every non-marker member of a container as (path, bytes) pairs.
pub fn read_contents(container: &Container) -> Vec<(String, Vec<u8>)> {
    container
        .list_members()
        .expect("Failed to list members")
        .into_iter()
        .filter(|m| !m.is_folder_marker())
        .map(|m| {
            let data = container
                .read_payload(&m.path)
                .expect("Failed to read payload");
            (m.path, data)
        })
        .collect()
}

/// Returns the stored member paths in container order.
pub fn member_paths(container: &Container) -> Vec<String> {
    container
        .list_members()
        .expect("Failed to list members")
        .into_iter()
        .map(|m| m.path)
        .collect()
}

/// Reads every member, markers included, by its own payload reference.
///
/// Unlike [`read_contents`], repeated paths yield each stored copy.
pub fn member_payloads(container: &Container) -> Vec<(String, Vec<u8>)> {
    let mut reader = container
        .adapter()
        .open_read(container.path())
        .expect("Failed to open archive");
    reader
        .list_members()
        .expect("Failed to list members")
        .into_iter()
        .map(|m| {
            let mut data = Vec::new();
            reader
                .copy_payload(&m, &mut data)
                .expect("Failed to read payload");
            (m.path, data)
        })
        .collect()
}

/// Writes `dir/repeated.zip` holding `notes/`, `a.txt`="first", `notes/`,
/// `a.txt`="second" and `b.txt`="bee", in that order.
///
/// The `zip` crate refuses to write a name twice, so the second copies are
/// written under same-length placeholder names that are patched afterwards.
pub fn zip_with_repeated_names(dir: &Path) -> PathBuf {
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let entries: [(&str, Option<&[u8]>); 5] = [
        ("notes/", None),
        ("a.txt", Some(b"first")),
        ("notez/", None),
        ("a.txz", Some(b"second")),
        ("b.txt", Some(b"bee")),
    ];
    for (name, data) in entries {
        match data {
            None => writer.add_directory(name, stored).expect("Failed to add directory"),
            Some(data) => {
                writer.start_file(name, stored).expect("Failed to start file");
                writer.write_all(data).expect("Failed to write file");
            }
        }
    }
    let mut bytes = writer.finish().expect("Failed to finish zip").into_inner();
    replace_same_len(&mut bytes, b"notez/", b"notes/");
    replace_same_len(&mut bytes, b"a.txz", b"a.txt");

    let path = dir.join("repeated.zip");
    fs::write(&path, bytes).expect("Failed to write zip");
    path
}

fn replace_same_len(bytes: &mut [u8], from: &[u8], to: &[u8]) {
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
