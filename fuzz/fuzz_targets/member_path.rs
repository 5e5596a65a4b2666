//! Fuzz target for MemberPath::new with arbitrary string input.
//!
//! Run with: cargo +nightly fuzz run member_path
//!
//! Properties checked on every accepted path:
//! - No `.` or `..` segments
//! - Not absolute
//! - No NUL bytes
//! - No empty segments apart from one trailing `/`

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(path_str) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(path) = arcfold::MemberPath::new(path_str) {
        let text = path.as_str();
        assert!(!text.starts_with('/'), "Absolute path accepted: {:?}", text);
        assert!(!text.contains('\0'), "NUL byte accepted: {:?}", text);

        let body = text.strip_suffix('/').unwrap_or(text);
        for segment in body.split('/') {
            assert!(
                !segment.is_empty() && segment != "." && segment != "..",
                "Bad segment {:?} in {:?}",
                segment,
                text
            );
        }
    }
});
