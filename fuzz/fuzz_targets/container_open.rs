//! Fuzz target for opening arbitrary bytes as a ZIP or TAR container.
//!
//! The bytes are written to a `.zip` and a `.tar` file and opened through
//! [`arcfold::Container::open`]. Anything that opens is listed, searched and
//! extracted, which exercises member parsing and extraction path checks.
//!
//! Run with: cargo +nightly fuzz run container_open

#![no_main]

use arcfold::{Container, Engine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(dir) = tempfile::TempDir::new() else {
        return;
    };

    for name in ["input.zip", "input.tar"] {
        let path = dir.path().join(name);
        if std::fs::write(&path, data).is_err() {
            return;
        }

        // We don't care about the result - we're looking for panics or hangs
        let Ok(container) = Container::open(&path) else {
            continue;
        };

        let engine = Engine::default();
        let _ = engine.list(&container, "");
        let _ = engine.search(&container, "a");

        let out = dir.path().join("out");
        if engine.extract_all(&container, &out).is_ok() {
            // Extraction must never leave the destination.
            for entry in std::fs::read_dir(dir.path()).into_iter().flatten().flatten() {
                let file_name = entry.file_name();
                assert!(
                    ["input.zip", "input.tar", "out"]
                        .iter()
                        .any(|known| file_name == *known),
                    "extraction escaped to {:?}",
                    entry.path()
                );
            }
        }
        let _ = std::fs::remove_dir_all(&out);
    }
});
