//! Architecture guard: the ranking core stays storage-agnostic.
//!
//! Everything under `src/services` talks to storage through the
//! `ContentStore`, `FollowGraph` and `FeedCacheStore` traits only, and reads
//! time from the injected clock.

use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

/// Source of a file with its `#[cfg(test)]` module cut off.
fn non_test_source(path: &Path) -> String {
    let source = fs::read_to_string(path).unwrap_or_default();
    match source.find("#[cfg(test)]") {
        Some(idx) => source[..idx].to_string(),
        None => source,
    }
}

fn offenders(needles: &[&str]) -> Vec<String> {
    let services = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/services");
    collect_rs_files(&services)
        .into_iter()
        .filter(|file| {
            let source = non_test_source(file);
            needles.iter().any(|n| source.contains(n))
        })
        .map(|file| file.display().to_string())
        .collect()
}

#[test]
fn services_do_not_touch_storage_drivers() {
    let found = offenders(&["sqlx::", "redis::", "PgPool"]);
    assert!(
        found.is_empty(),
        "ranking services must go through the store traits: {:?}",
        found
    );
}

#[test]
fn services_use_injected_clock() {
    let found = offenders(&["Utc::now()", "SystemTime::now()"]);
    assert!(
        found.is_empty(),
        "ranking services must read time from Clock: {:?}",
        found
    );
}
