//! Fuzz target for shell decomposition.
//!
//! Checks that `decompose` never panics and only yields non-empty,
//! distinct, trimmed fragments.

#![no_main]

use libfuzzer_sys::fuzz_target;

use git_guard::decompose::decompose;
use std::collections::HashSet;

fuzz_target!(|data: &[u8]| {
    let Ok(command) = std::str::from_utf8(data) else {
        return;
    };
    if command.len() > 10_000 {
        return;
    }

    let parts = decompose(command);
    let mut seen = HashSet::new();
    for part in &parts {
        assert!(!part.is_empty());
        assert_eq!(part.trim(), part);
        assert!(seen.insert(part), "duplicate fragment {part:?}");
    }
});
