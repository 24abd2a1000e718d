//! Git fixtures shared by the integration tests.

#![allow(dead_code)]

mod repo;

pub use repo::TestRepo as Fixture;

use std::fs;
use std::path::Path;

/// Relative path and contents of every file under `root`, sorted.
pub fn tree_contents(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .to_string();
            let contents = fs::read(entry.path()).expect("read extracted file");
            (relative, contents)
        })
        .collect();
    files.sort();
    files
}
