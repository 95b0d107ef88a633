//! Chunk-size advisor.
//!
//! Inspects aggregate text volume under a directory and proposes a
//! chunk-size/overlap pair. Purely advisory; callers may override with
//! explicit values.

use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::loader::DEFAULT_EXTENSIONS;

/// Suggest `(chunk_size, chunk_overlap)` from the total line count of the
/// included-extension files under `base_path`.
///
/// Monotonic in corpus size: below 500 lines → (400, 50), below 1500 →
/// (800, 100), otherwise (1200, 150). Unreadable files contribute zero.
pub fn suggest_chunk_config(base_path: &Path) -> (usize, usize) {
    let mut total_lines = 0usize;

    for entry in WalkDir::new(base_path).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !DEFAULT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(entry.path()) {
            total_lines += content.lines().count();
        }
    }

    debug!(total_lines, "advisor counted corpus volume");

    if total_lines < 500 {
        (400, 50)
    } else if total_lines < 1500 {
        (800, 100)
    } else {
        (1200, 150)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus_with_lines(lines: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("code.py"), "x = 1\n".repeat(lines)).unwrap();
        dir
    }

    #[test]
    fn small_corpus_gets_small_chunks() {
        let dir = corpus_with_lines(100);
        assert_eq!(suggest_chunk_config(dir.path()), (400, 50));
    }

    #[test]
    fn medium_corpus_gets_medium_chunks() {
        let dir = corpus_with_lines(800);
        assert_eq!(suggest_chunk_config(dir.path()), (800, 100));
    }

    #[test]
    fn large_corpus_gets_large_chunks() {
        let dir = corpus_with_lines(2000);
        assert_eq!(suggest_chunk_config(dir.path()), (1200, 150));
    }

    #[test]
    fn suggestion_is_monotonic_in_corpus_size() {
        let small = corpus_with_lines(400);
        let large = corpus_with_lines(2000);
        let (small_size, _) = suggest_chunk_config(small.path());
        let (large_size, _) = suggest_chunk_config(large.path());
        assert!(large_size >= small_size);
    }

    #[test]
    fn non_included_extensions_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.log"), "line\n".repeat(5000)).unwrap();
        assert_eq!(suggest_chunk_config(dir.path()), (400, 50));
    }
}
