//! Filesystem content loader.
//!
//! Walks a directory tree and produces one [`SourceDocument`] per readable
//! text file, filtering by extension and skipping binaries. Per-file load
//! failures are logged and skipped — a single unreadable file never aborts
//! the whole load.

use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::SourceDocument;

/// Default extension set: common source/text/doc formats.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".md", ".txt", ".js", ".ts", ".jsx", ".tsx", ".rs", ".go", ".java", ".json", ".toml",
    ".yaml", ".yml", ".env", ".gitignore",
];

/// Bytes sniffed from the head of each file for binary detection.
const SNIFF_BYTES: usize = 1024;

/// Detect binary content: a NUL byte in the first KiB, or a UTF-16 BOM.
/// Unreadable files are treated as binary so the walk keeps going.
pub fn is_binary(path: &Path) -> bool {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return true,
    };
    let mut head = [0u8; SNIFF_BYTES];
    let n = match file.read(&mut head) {
        Ok(n) => n,
        Err(_) => return true,
    };
    let head = &head[..n];
    head.contains(&0) || head.starts_with(&[0xFF, 0xFE]) || head.starts_with(&[0xFE, 0xFF])
}

fn matches_extension(file_name: &str, include_exts: &[String]) -> bool {
    let lower = file_name.to_lowercase();
    include_exts
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Load all matching text files under `base_path`.
///
/// Any path segment equal to an entry in `exclude_dirs` prunes that whole
/// subtree. Files are decoded permissively: undecodable bytes are replaced
/// rather than failing the load.
pub fn load_codebase(
    base_path: &Path,
    include_exts: Option<&[String]>,
    exclude_dirs: &[String],
) -> Result<Vec<SourceDocument>> {
    if !base_path.is_dir() {
        return Err(Error::InvalidSource(format!(
            "not a directory: {}",
            base_path.display()
        )));
    }

    let default_exts: Vec<String> = DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect();
    let include_exts = include_exts.unwrap_or(&default_exts);
    let exclude_dirs: Vec<&str> = exclude_dirs
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();

    let mut docs = Vec::new();

    let walker = WalkDir::new(base_path).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !exclude_dirs.iter().any(|d| *d == name)
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        if !matches_extension(&file_name, include_exts) {
            continue;
        }

        if is_binary(path) {
            debug!(path = %path.display(), "skipped binary or non-UTF file");
            continue;
        }

        let text = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                let err = Error::Load {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "skipped unreadable file");
                continue;
            }
        };

        let relative = path.strip_prefix(base_path).unwrap_or(path);
        let source_id = relative.to_string_lossy().to_string();
        debug!(path = %path.display(), "loaded");
        docs.push(SourceDocument { text, source_id });
    }

    // Sort for deterministic ordering across platforms
    docs.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    info!(count = docs.len(), "documents loaded");
    Ok(docs)
}
