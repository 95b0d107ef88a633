//! Recursive character-boundary text splitter.
//!
//! Splits loaded documents into overlapping chunks: pieces are cut on a
//! prioritized list of separators (paragraph, line, sentence-ish
//! punctuation, word, then hard character cut) until every piece fits the
//! chunk size, then reassembled greedily with `chunk_overlap` trailing
//! characters carried into the next chunk.
//!
//! Chunks from a `README.md` document are duplicated and placed before all
//! other chunks. That is a retrieval-ranking bias toward project
//! documentation, preserved exactly for compatibility with existing
//! persisted indexes.
//!
//! All length arithmetic is in characters, never bytes, so multi-byte
//! content is split safely.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Chunk, SourceDocument};

/// Split priority: paragraph, line, sentence boundary, word.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (all of `s` if shorter).
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    if len <= n {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

/// Cut `text` into pieces no longer than `chunk_size` characters, trying
/// separators in priority order and hard-cutting as a last resort.
fn split_pieces(text: &str, chunk_size: usize, sep_idx: usize) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    if sep_idx >= SEPARATORS.len() {
        // Hard cut at character boundaries.
        let chars: Vec<char> = text.chars().collect();
        return chars
            .chunks(chunk_size)
            .map(|c| c.iter().collect())
            .collect();
    }

    let sep = SEPARATORS[sep_idx];
    if !text.contains(sep) {
        return split_pieces(text, chunk_size, sep_idx + 1);
    }

    let mut pieces = Vec::new();
    for part in text.split_inclusive(sep) {
        if char_len(part) > chunk_size {
            pieces.extend(split_pieces(part, chunk_size, sep_idx + 1));
        } else {
            pieces.push(part.to_string());
        }
    }
    pieces
}

/// Split one document's text into chunk strings of at most `chunk_size`
/// characters, with `chunk_overlap` characters of trailing context carried
/// into each following chunk. Empty or whitespace-only text yields no
/// chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let pieces = split_pieces(text, chunk_size, 0);

    let mut chunks = Vec::new();
    let mut buf = String::new();
    for piece in &pieces {
        let piece_len = char_len(piece);
        if !buf.is_empty() && char_len(&buf) + piece_len > chunk_size {
            chunks.push(std::mem::take(&mut buf));
            // Carry overlap from the flushed chunk, shrunk so the next
            // chunk never exceeds chunk_size.
            let carry = chunk_overlap.min(chunk_size.saturating_sub(piece_len));
            buf = tail_chars(chunks.last().expect("just pushed"), carry);
        }
        buf.push_str(piece);
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }

    chunks
}

fn is_readme(source_id: &str) -> bool {
    Path::new(source_id)
        .file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case("readme.md"))
        .unwrap_or(false)
}

/// Chunk a set of loaded documents.
///
/// README chunks are duplicated (the whole list appears twice, in order)
/// and placed before all other documents' chunks; relative order is
/// preserved within each group.
pub fn chunk_documents(
    documents: &[SourceDocument],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::InvalidChunk("chunk_size must be > 0".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(Error::InvalidChunk(format!(
            "chunk_overlap ({chunk_overlap}) must be < chunk_size ({chunk_size})"
        )));
    }

    let mut readme_chunks = Vec::new();
    let mut other_chunks = Vec::new();

    for doc in documents {
        let texts = split_text(&doc.text, chunk_size, chunk_overlap);
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                text,
                source_id: doc.source_id.clone(),
                sequence_index,
            })
            .collect();

        if is_readme(&doc.source_id) {
            readme_chunks.extend(chunks.clone());
            readme_chunks.extend(chunks);
        } else {
            other_chunks.extend(chunks);
        }
    }

    readme_chunks.extend(other_chunks);
    Ok(readme_chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, source_id: &str) -> SourceDocument {
        SourceDocument::new(text, source_id)
    }

    #[test]
    fn short_document_yields_single_chunk() {
        let chunks = chunk_documents(&[doc("tiny text", "a.txt")], 400, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny text");
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let chunks = chunk_documents(&[], 400, 50).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_must_be_below_size() {
        let err = chunk_documents(&[doc("text", "a.txt")], 100, 100).unwrap_err();
        assert!(matches!(err, Error::InvalidChunk(_)));
    }

    #[test]
    fn no_chunk_exceeds_chunk_size() {
        let text = "word ".repeat(500) + "\n\n" + &"line\n".repeat(300);
        for (size, overlap) in [(50, 10), (120, 30), (400, 50)] {
            for chunk in split_text(&text, size, overlap) {
                assert!(
                    chunk.chars().count() <= size,
                    "chunk of {} chars exceeds size {}",
                    chunk.chars().count(),
                    size
                );
            }
        }
    }

    #[test]
    fn every_character_appears_in_some_chunk() {
        let text = "Paragraph one about loading.\n\nParagraph two about chunking. \
                    It has two sentences.\n\nParagraph three closes the file.";
        let chunks = split_text(text, 40, 10);
        let joined: String = chunks.concat();
        // Overlap duplicates characters, so the concatenation must contain
        // the full text as an in-order (non-contiguous) cover: check every
        // piece of the original survives somewhere.
        for word in text.split_whitespace() {
            assert!(
                joined.contains(word.trim_end_matches('.')),
                "lost word: {word}"
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = split_text(text, 20, 8);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // The next chunk starts with trailing context from the previous
            // one (possibly shrunk to respect the size cap).
            let shares_tail = (1..=8).any(|n| pair[1].starts_with(tail_chars(&pair[0], n).as_str()));
            assert!(
                shares_tail,
                "missing overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn hard_cut_handles_unsplittable_runs() {
        let text = "x".repeat(1000);
        let chunks = split_text(&text, 100, 10);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld. ".repeat(100);
        let chunks = split_text(&text, 50, 10);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn readme_chunks_are_duplicated_in_order_and_first() {
        let readme_text = format!("{}\n\n{}", "r".repeat(80), "s".repeat(80));
        let docs = vec![
            doc("plain code file", "src/main.py"),
            doc(&readme_text, "README.md"),
        ];
        let chunks = chunk_documents(&docs, 100, 10).unwrap();

        let readme: Vec<&Chunk> = chunks.iter().filter(|c| c.source_id == "README.md").collect();
        assert_eq!(readme.len() % 2, 0);
        let half = readme.len() / 2;
        for i in 0..half {
            assert_eq!(readme[i].text, readme[half + i].text);
            assert_eq!(readme[i].sequence_index, readme[half + i].sequence_index);
        }
        // All README chunks come before any other document's chunks.
        assert!(chunks[..readme.len()]
            .iter()
            .all(|c| c.source_id == "README.md"));
        assert_eq!(chunks.last().unwrap().source_id, "src/main.py");
    }

    #[test]
    fn readme_detection_is_basename_case_insensitive() {
        assert!(is_readme("README.md"));
        assert!(is_readme("docs/ReadMe.MD"));
        assert!(!is_readme("README.rst"));
        assert!(!is_readme("readme.md.bak"));
    }

    #[test]
    fn deterministic() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta.".repeat(20);
        let a = split_text(&text, 60, 15);
        let b = split_text(&text, 60, 15);
        assert_eq!(a, b);
    }
}
