//! Fingerprint-keyed persisted vector index.
//!
//! Each index lives in its own subdirectory of the storage root, named by
//! the [`fingerprint`] of (normalized source key, chunk size, overlap):
//!
//! ```text
//! <storage_root>/<fingerprint>/
//!     meta.json     index metadata (model, dims, chunk params, count)
//!     chunks.json   chunk payloads in insertion order
//!     vectors.bin   little-endian f32 embeddings, count × dims × 4 bytes
//! ```
//!
//! Directory presence is the cache-hit signal. Rebuilding removes the
//! directory and writes a fresh one — indexes are never mutated in place.
//! There is no cross-process locking around check-then-build: concurrent
//! builders against the same fingerprint are a single-writer assumption.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::error::{Error, Result};
use crate::models::Chunk;

const META_FILE: &str = "meta.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.bin";

/// Derive the cache key for (source, chunk size, overlap).
///
/// SHA-256 of the normalized source key truncated to 12 hex characters,
/// suffixed with the chunking literals. Identical inputs always yield the
/// identical fingerprint; a changed chunk size misses the cache and
/// triggers a rebuild rather than silently reusing mismatched chunks.
pub fn fingerprint(source_key: &str, chunk_size: usize, chunk_overlap: usize) -> String {
    let normalized = source_key.trim().trim_end_matches('/');
    let digest = Sha256::digest(normalized.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}_c{chunk_size}_o{chunk_overlap}", &hex[..12])
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexMeta {
    fingerprint: String,
    model: String,
    dims: usize,
    chunk_count: usize,
    created_at: i64,
}

/// Handle to one fingerprint's persisted index, loaded into memory.
#[derive(Debug)]
pub struct VectorIndex {
    fingerprint: String,
    dims: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True when a persisted index exists for this fingerprint.
    pub fn exists(storage_root: &Path, fingerprint: &str) -> bool {
        storage_root.join(fingerprint).join(META_FILE).exists()
    }

    /// Embed `chunks` and persist a fresh index, fully replacing any prior
    /// contents at this fingerprint's location.
    pub async fn build(
        chunks: Vec<Chunk>,
        fingerprint: &str,
        embedder: &dyn Embedder,
        storage_root: &Path,
        batch_size: usize,
    ) -> Result<Self> {
        for chunk in &chunks {
            if chunk.text.trim().is_empty() {
                return Err(Error::InvalidChunk(format!(
                    "empty chunk text from source '{}'",
                    chunk.source_id
                )));
            }
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        for batch in texts.chunks(batch_size.max(1)) {
            let mut embedded = embedder.embed(batch).await?;
            vectors.append(&mut embedded);
        }

        if vectors.len() != chunks.len() {
            return Err(Error::EmbeddingEngineUnavailable(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        // The backend's declared dims() is advisory; persist the width the
        // backend actually returned, or load would reject a healthy index
        // built with a non-default model.
        let dims = vectors
            .first()
            .map(|v| v.len())
            .unwrap_or_else(|| embedder.dims());
        if !vectors.is_empty() && dims == 0 {
            return Err(Error::EmbeddingEngineUnavailable(
                "embedding backend returned zero-width vectors".to_string(),
            ));
        }
        for vec in &vectors {
            if vec.len() != dims {
                return Err(Error::EmbeddingEngineUnavailable(format!(
                    "non-uniform embedding widths: expected {dims}, got {}",
                    vec.len()
                )));
            }
        }

        let dir = storage_root.join(fingerprint);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        let meta = IndexMeta {
            fingerprint: fingerprint.to_string(),
            model: embedder.model_name().to_string(),
            dims,
            chunk_count: chunks.len(),
            created_at: chrono::Utc::now().timestamp(),
        };
        std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
        std::fs::write(dir.join(CHUNKS_FILE), serde_json::to_string(&chunks)?)?;

        let mut blob = Vec::new();
        for vec in &vectors {
            blob.extend_from_slice(&vec_to_blob(vec));
        }
        std::fs::write(dir.join(VECTORS_FILE), blob)?;

        info!(
            fingerprint,
            chunks = chunks.len(),
            model = %meta.model,
            "vector index built"
        );

        Ok(Self {
            fingerprint: fingerprint.to_string(),
            dims: meta.dims,
            chunks,
            vectors,
        })
    }

    /// Open an existing persisted index without re-embedding.
    pub fn load(fingerprint: &str, storage_root: &Path) -> Result<Self> {
        let dir = storage_root.join(fingerprint);
        if !dir.join(META_FILE).exists() {
            return Err(Error::IndexNotFound(fingerprint.to_string()));
        }

        let meta: IndexMeta =
            serde_json::from_str(&std::fs::read_to_string(dir.join(META_FILE))?)?;
        let chunks: Vec<Chunk> =
            serde_json::from_str(&std::fs::read_to_string(dir.join(CHUNKS_FILE))?)?;
        let blob = std::fs::read(dir.join(VECTORS_FILE))?;

        if meta.chunk_count > 0 && meta.dims == 0 {
            return Err(Error::InvalidChunk(format!(
                "persisted index '{fingerprint}' is corrupt (zero vector width)"
            )));
        }
        if blob.len() != meta.chunk_count * meta.dims * 4 || chunks.len() != meta.chunk_count {
            return Err(Error::InvalidChunk(format!(
                "persisted index '{fingerprint}' is corrupt (payload size mismatch)"
            )));
        }

        let vectors: Vec<Vec<f32>> = if meta.dims == 0 {
            Vec::new()
        } else {
            blob.chunks_exact(meta.dims * 4).map(blob_to_vec).collect()
        };

        debug!(fingerprint, chunks = chunks.len(), "vector index loaded");

        Ok(Self {
            fingerprint: fingerprint.to_string(),
            dims: meta.dims,
            chunks,
            vectors,
        })
    }

    /// Top-k chunks by cosine similarity to `query_text`, nearest first.
    /// The sort is stable, so ties keep insertion order.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<Chunk>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(embedder, query_text).await?;
        if query_vec.len() != self.dims {
            return Err(Error::EmbeddingEngineUnavailable(format!(
                "query embedding has {} dims, index has {}",
                query_vec.len(),
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(&query_vec, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, _)| self.chunks[i].clone())
            .collect())
    }
}
