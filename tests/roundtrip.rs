//! Round-trip tests: files added to an archive come back out unchanged.

mod common;

use std::fs;

use arcfold::{Compression, Container, Engine, EngineOptions, ListingMode};
use common::{FORMATS, archive_path, random_bytes, read_contents, write_source};
use tempfile::TempDir;

// =============================================================================
// add_files -> list -> extract_all
// =============================================================================

#[test]
fn test_add_list_extract_roundtrip() {
    for format in FORMATS {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let small = write_source(&src, "small.txt", b"hello world");
        let empty = write_source(&src, "empty.bin", b"");
        let large = write_source(&src, "large.bin", &random_bytes(7, 200_000));

        let container = Container::create(archive_path(dir.path(), "rt", format)).unwrap();
        let engine = Engine::new(EngineOptions::default());
        let report = engine
            .add_files(&container, "", &[&small, &empty, &large])
            .unwrap();
        assert!(report.is_ok(), "{format}: {:?}", report.failures);
        assert_eq!(report.added, vec!["small.txt", "empty.bin", "large.bin"]);
        assert_eq!(report.bytes_added, 11 + 200_000);

        let rows = engine.list(&container, "").unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, ["small.txt", "empty.bin", "large.bin"], "{format}");
        assert_eq!(rows[0].size(), 11);

        let out = dir.path().join("out");
        let extracted = engine.extract_all(&container, &out).unwrap();
        assert_eq!(extracted.files_written, 3);
        assert_eq!(extracted.bytes_written, 11 + 200_000);

        for source in [&small, &empty, &large] {
            let name = source.file_name().unwrap();
            assert_eq!(
                fs::read(out.join(name)).unwrap(),
                fs::read(source).unwrap(),
                "{format}: {}",
                name.to_string_lossy()
            );
        }
    }
}

#[test]
fn test_add_into_folder_keeps_prefix() {
    for format in FORMATS {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), "report.txt", b"quarterly");
        let container = Container::create(archive_path(dir.path(), "a", format)).unwrap();
        let engine = Engine::new(EngineOptions::default());

        let report = engine
            .add_files(&container, "docs/2024/", &[&source])
            .unwrap();
        assert_eq!(report.added, vec!["docs/2024/report.txt"]);

        let out = dir.path().join("out");
        let _ = engine.extract_all(&container, &out).unwrap();
        assert_eq!(
            fs::read(out.join("docs").join("2024").join("report.txt")).unwrap(),
            b"quarterly"
        );
    }
}

#[test]
fn test_stored_and_deflated_zip_members_read_back() {
    let dir = TempDir::new().unwrap();
    let data = b"compressible ".repeat(1000);
    let source = write_source(dir.path(), "text.txt", &data);

    for compression in [Compression::Stored, Compression::Deflated] {
        let path = dir.path().join(format!("{compression:?}.zip"));
        let container = Container::create(&path).unwrap();
        let engine = Engine::new(EngineOptions::new().compression(compression));
        let _ = engine.add_files(&container, "", &[&source]).unwrap();
        assert_eq!(container.read_payload("text.txt").unwrap(), data);
    }
}

#[test]
fn test_mtime_survives_roundtrip() {
    for format in FORMATS {
        let dir = TempDir::new().unwrap();
        let source = write_source(dir.path(), "dated.txt", b"x");
        // An even second so the DOS two-second resolution is exact.
        let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        let container = Container::create(archive_path(dir.path(), "m", format)).unwrap();
        let engine = Engine::new(EngineOptions::default());
        let _ = engine.add_files(&container, "", &[&source]).unwrap();

        let member = &container.list_members().unwrap()[0];
        assert_eq!(
            member.modified_at.map(|t| t.as_unix_secs()),
            Some(1_600_000_000),
            "{format}"
        );

        let out = dir.path().join("out");
        let _ = engine.extract_all(&container, &out).unwrap();
        let meta = fs::metadata(out.join("dated.txt")).unwrap();
        assert_eq!(
            filetime::FileTime::from_last_modification_time(&meta).unix_seconds(),
            1_600_000_000,
            "{format}"
        );
    }
}

// =============================================================================
// add_folder_recursive
// =============================================================================

#[test]
fn test_add_folder_recursive_roundtrip() {
    for format in FORMATS {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("project");
        write_source(&tree, "README.md", b"# readme");
        write_source(&tree, "src/main.rs", b"fn main() {}");
        write_source(&tree, "src/util/mod.rs", &random_bytes(3, 5000));
        fs::create_dir_all(tree.join("empty")).unwrap();

        let container = Container::create(archive_path(dir.path(), "tree", format)).unwrap();
        let engine = Engine::new(EngineOptions::default());
        let report = engine
            .add_folder_recursive(&container, "backup/", &tree)
            .unwrap();
        assert!(report.is_ok());
        assert_eq!(
            report.added,
            vec![
                "backup/README.md",
                "backup/src/main.rs",
                "backup/src/util/mod.rs"
            ],
            "{format}"
        );

        // Empty directories are not represented.
        let contents = read_contents(&container);
        assert_eq!(contents.len(), 3);
        assert!(
            container
                .list_members()
                .unwrap()
                .iter()
                .all(|m| !m.path.contains("empty"))
        );

        let out = dir.path().join("out");
        let _ = engine.extract_all(&container, &out).unwrap();
        assert_eq!(
            fs::read(out.join("backup/src/util/mod.rs")).unwrap(),
            random_bytes(3, 5000)
        );
    }
}

#[test]
fn test_nested_listing_after_recursive_add() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("site");
    write_source(&tree, "index.html", b"<html>");
    write_source(&tree, "css/main.css", b"body {}");
    write_source(&tree, "css/print.css", b"@media print {}");

    let container = Container::create(dir.path().join("site.zip")).unwrap();
    let engine = Engine::new(EngineOptions::new().listing_mode(ListingMode::Nested));
    let _ = engine.add_folder_recursive(&container, "", &tree).unwrap();

    let rows = engine.list(&container, "").unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, ["css/", "index.html"]);
    assert!(rows[0].is_folder());
    assert!(rows[0].member.is_none());
}

// =============================================================================
// Reopen
// =============================================================================

#[test]
fn test_reopen_after_edits() {
    for format in FORMATS {
        let dir = TempDir::new().unwrap();
        let path = archive_path(dir.path(), "re", format);
        let source = write_source(dir.path(), "a.txt", b"alpha");
        {
            let container = Container::create(&path).unwrap();
            let engine = Engine::new(EngineOptions::default());
            let _ = engine.add_files(&container, "", &[&source]).unwrap();
            let _ = engine.create_folder_marker(&container, "", "later").unwrap();
        }

        let reopened = Container::open(&path).unwrap();
        assert_eq!(reopened.format(), format);
        assert_eq!(common::member_paths(&reopened), ["a.txt", "later/"]);
        assert_eq!(reopened.read_payload("a.txt").unwrap(), b"alpha");
    }
}
