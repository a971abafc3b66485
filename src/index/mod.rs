//! Append-only vector index: a flat `f32` matrix paired with a JSONL
//! metadata log, searched by exhaustive cosine scan.
//!
//! There is deliberately no approximate nearest-neighbor structure here
//! (no HNSW, no quantization) — at the scale of one project's session
//! history a flat scan is fast enough, and it is trivially correct and
//! trivially recoverable.

use std::fs::OpenOptions;
use std::io::{Read as _, Write as _};
use std::path::Path;

use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{Chunk, ChunkKey, SourceType};
use crate::error::{IndexError, Result, StorageError};
use crate::io;
use crate::oracle::Oracle;
use crate::storage::Layout;

/// How many vectors to buffer before flushing to disk during a build.
const FLUSH_BATCH_SIZE: usize = 64;

/// One line of `index/metadata.jsonl`: the full identifying key of the
/// chunk a vector in `vectors.bin` at the same ordinal position
/// corresponds to, plus enough of the chunk's own fields to hydrate a
/// search hit without a further store lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Owning session id, or `"artifacts"`.
    pub session_id: String,
    /// 0-based position within the owning chunk log.
    pub chunk_index: usize,
    /// Kind of content the chunk was drawn from.
    pub source_type: SourceType,
    /// Start timestamp, seconds since epoch; `0` for imports lacking one.
    pub start_ts: i64,
    /// Quality score in `[0.0, 1.0]`, rounded to three decimals.
    pub quality: f64,
    /// Cleaned UTF-8 text.
    pub text: String,
    /// Approximate token count, see [`crate::chunking::token_count`].
    pub token_count: usize,
}

impl IndexEntry {
    /// Converts to the key type used elsewhere to identify a chunk.
    #[must_use]
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            session_id: self.session_id.clone(),
            chunk_index: self.chunk_index,
            source_type: self.source_type,
        }
    }

    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            session_id: chunk.session_id.clone(),
            chunk_index: chunk.chunk_index,
            source_type: chunk.source_type,
            start_ts: chunk.start_ts,
            quality: chunk.quality,
            text: chunk.text.clone(),
            token_count: chunk.token_count,
        }
    }

    /// Reconstructs a [`Chunk`] directly from this metadata record, so a
    /// search hit can be scored and rendered without loading the owning
    /// chunk log. `end_ts` is set equal to `start_ts` and `speaker_role`
    /// is unset, since neither is part of the metadata record; nothing
    /// downstream of retrieval reads either field.
    #[must_use]
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            session_id: self.session_id.clone(),
            chunk_index: self.chunk_index,
            source_type: self.source_type,
            text: self.text.clone(),
            token_count: self.token_count,
            quality: self.quality,
            start_ts: self.start_ts,
            end_ts: self.start_ts,
            speaker_role: None,
        }
    }
}

/// A handle to an open vector index.
pub struct VectorIndex<'a> {
    layout: &'a Layout,
    dim: usize,
}

impl<'a> VectorIndex<'a> {
    /// Opens the index at `layout`'s `index/` directory for `dim`
    /// dimensional vectors.
    ///
    /// Performs crash recovery (truncating `vectors.bin` to the byte
    /// length implied by `metadata.jsonl`) and checks the stored `dim`
    /// sidecar against `dim`, writing it if the index is new.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimMismatch`] if an existing index was
    /// built with a different embedding dimension; the caller should
    /// call [`VectorIndex::rebuild`] in that case. Returns an error if
    /// the sidecar files cannot be read or written.
    pub fn open(layout: &'a Layout, dim: usize) -> Result<Self> {
        let dim_path = layout.index_dim();
        if dim_path.exists() {
            let stored = read_dim(&dim_path)?;
            if stored != dim {
                return Err(IndexError::DimMismatch {
                    expected: stored,
                    actual: dim,
                }
                .into());
            }
        } else {
            write_dim(&dim_path, dim)?;
        }
        let index = Self { layout, dim };
        index.recover()?;
        Ok(index)
    }

    /// Truncates `vectors.bin` to the length implied by the metadata
    /// log, discarding any vector bytes written but not yet committed
    /// by a trailing metadata line.
    fn recover(&self) -> Result<()> {
        let entry_count = self.metadata_len()?;
        let expected_len = (entry_count * self.dim * 4) as u64;
        let vectors_path = self.layout.index_vectors();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&vectors_path)?;
        let actual_len = file.metadata()?.len();
        if actual_len > expected_len {
            file.set_len(expected_len)?;
        }
        Ok(())
    }

    /// Number of entries currently recorded in `metadata.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata log exists but cannot be read.
    pub fn metadata_len(&self) -> Result<usize> {
        Ok(self.read_metadata()?.len())
    }

    fn read_metadata(&self) -> Result<Vec<IndexEntry>> {
        let path = self.layout.index_metadata();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = io::read_file(&path)?;
        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Returns the set of chunk keys already present in the index, for
    /// callers deciding which chunks still need embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata log cannot be read.
    pub fn indexed_keys(&self) -> Result<std::collections::HashSet<ChunkKey>> {
        Ok(self.read_metadata()?.into_iter().map(|e| e.key()).collect())
    }

    /// Appends `(entry, vector)` pairs to the index, `dim`-length
    /// vectors only. Vectors are written and fsynced before their
    /// metadata line is appended and fsynced, so a crash can never
    /// leave `metadata.jsonl` pointing past fully-written vector bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimMismatch`] if any vector's length does
    /// not match the index dimension. Returns an error if the append
    /// fails.
    pub fn append(&self, items: &[(IndexEntry, Vec<f32>)]) -> Result<()> {
        for chunk in items.chunks(FLUSH_BATCH_SIZE) {
            self.append_batch(chunk)?;
        }
        Ok(())
    }

    fn append_batch(&self, items: &[(IndexEntry, Vec<f32>)]) -> Result<()> {
        for (_, vector) in items {
            if vector.len() != self.dim {
                return Err(IndexError::DimMismatch {
                    expected: self.dim,
                    actual: vector.len(),
                }
                .into());
            }
        }
        let mut vectors_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.layout.index_vectors())?;
        for (_, vector) in items {
            let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
            vectors_file.write_all(&bytes)?;
        }
        vectors_file.sync_all()?;

        let mut metadata_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.layout.index_metadata())?;
        for (entry, _) in items {
            let line = serde_json::to_string(entry).map_err(StorageError::from)?;
            writeln!(metadata_file, "{line}")?;
        }
        metadata_file.sync_all()?;
        Ok(())
    }

    /// Embeds and appends every chunk whose key is not already indexed.
    ///
    /// # Errors
    ///
    /// Returns the first embedding or append failure encountered.
    pub fn build(&self, chunks: &[Chunk], oracle: &dyn Oracle) -> Result<usize> {
        let existing = self.indexed_keys()?;
        let pending: Vec<&Chunk> = chunks.iter().filter(|c| !existing.contains(&c.key())).collect();
        let mut added = 0;
        for batch in pending.chunks(FLUSH_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = oracle.embed_batch(&texts)?;
            let items: Vec<(IndexEntry, Vec<f32>)> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, mut vector)| {
                    crate::oracle::normalize(&mut vector);
                    (IndexEntry::from_chunk(chunk), vector)
                })
                .collect();
            added += items.len();
            self.append_batch(&items)?;
        }
        Ok(added)
    }

    /// Rebuilds the index from scratch: embeds every chunk and writes
    /// to `.new` sidecar files, then atomically renames them over the
    /// live index. Used when the embedding dimension changes, a
    /// metadata line is found corrupted, or an operator requests it.
    ///
    /// # Errors
    ///
    /// Returns the first embedding failure, or an error if the rename
    /// fails.
    pub fn rebuild(layout: &'a Layout, chunks: &[Chunk], oracle: &dyn Oracle) -> Result<Self> {
        let dim = oracle.dimensions();
        let vectors_new = layout.index_vectors_new();
        let metadata_new = layout.index_metadata_new();
        let _ = std::fs::remove_file(&vectors_new);
        let _ = std::fs::remove_file(&metadata_new);
        // Touch both sidecars up front so an empty chunk corpus still
        // produces a valid (empty) index: the loop below may run zero
        // batches, and the rename afterward needs a source file either way.
        OpenOptions::new().create(true).write(true).open(&vectors_new)?;
        OpenOptions::new().create(true).write(true).open(&metadata_new)?;

        for batch in chunks.chunks(FLUSH_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = oracle.embed_batch(&texts)?;
            append_raw(&vectors_new, &metadata_new, batch, vectors)?;
        }

        std::fs::rename(&vectors_new, layout.index_vectors())?;
        std::fs::rename(&metadata_new, layout.index_metadata())?;
        write_dim(&layout.index_dim(), dim)?;

        Ok(Self { layout, dim })
    }

    /// Finds the `top_k` entries most similar to `query` by cosine
    /// similarity, scanning the whole matrix.
    ///
    /// `query` is normalized internally; stored vectors are assumed
    /// already unit-normalized by [`VectorIndex::build`].
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata log cannot be read or the
    /// vectors file cannot be mapped.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(IndexEntry, f32)>> {
        let entries = self.read_metadata()?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = query.to_vec();
        crate::oracle::normalize(&mut query);

        let vectors_path = self.layout.index_vectors();
        let file = OpenOptions::new().read(true).open(&vectors_path)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| crate::error::IoError::MmapFailed {
            path: vectors_path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        let dim = self.dim;
        let mut scored: Vec<(usize, f32)> = (0..entries.len())
            .into_par_iter()
            .map(|i| {
                let start = i * dim * 4;
                let end = start + dim * 4;
                let bytes = &mmap[start..end];
                let dot: f32 = bytes
                    .chunks_exact(4)
                    .zip(query.iter())
                    .map(|(b, q)| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) * q)
                    .sum();
                (i, dot)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored
            .into_iter()
            .map(|(i, score)| (entries[i].clone(), score))
            .collect())
    }
}

fn append_raw(
    vectors_path: &Path,
    metadata_path: &Path,
    batch: &[Chunk],
    vectors: Vec<Vec<f32>>,
) -> Result<()> {
    let mut vectors_file = OpenOptions::new().append(true).create(true).open(vectors_path)?;
    let mut metadata_file = OpenOptions::new().append(true).create(true).open(metadata_path)?;
    for (chunk, mut vector) in batch.iter().zip(vectors) {
        crate::oracle::normalize(&mut vector);
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        vectors_file.write_all(&bytes)?;
        let entry = IndexEntry::from_chunk(chunk);
        let line = serde_json::to_string(&entry).map_err(StorageError::from)?;
        writeln!(metadata_file, "{line}")?;
    }
    vectors_file.sync_all()?;
    metadata_file.sync_all()?;
    Ok(())
}

fn read_dim(path: &Path) -> Result<usize> {
    let mut content = String::new();
    std::fs::File::open(path)?.read_to_string(&mut content)?;
    content
        .trim()
        .parse()
        .map_err(|_| StorageError::Corrupt {
            path: path.to_string_lossy().to_string(),
            reason: "dim file does not contain a valid integer".to_string(),
        }
        .into())
}

fn write_dim(path: &Path, dim: usize) -> Result<()> {
    io::write_file(path, &dim.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::fake::FakeOracle;

    fn layout() -> (tempfile::TempDir, Layout) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path().join(".memory-bank"));
        layout.ensure_dirs().unwrap();
        (tmp, layout)
    }

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            session_id: "s1".to_string(),
            chunk_index: i,
            source_type: SourceType::Session,
            text: text.to_string(),
            token_count: crate::chunking::token_count(text),
            quality: 1.0,
            start_ts: 100 + i as i64,
            end_ts: 100 + i as i64,
            speaker_role: None,
        }
    }

    #[test]
    fn open_writes_dim_sidecar_when_new() {
        let (_tmp, layout) = layout();
        let _index = VectorIndex::open(&layout, 32).unwrap();
        assert!(layout.index_dim().exists());
    }

    #[test]
    fn open_rejects_mismatched_dim() {
        let (_tmp, layout) = layout();
        let _index = VectorIndex::open(&layout, 32).unwrap();
        assert!(VectorIndex::open(&layout, 16).is_err());
    }

    #[test]
    fn build_embeds_and_search_finds_closest() {
        let (_tmp, layout) = layout();
        let oracle = FakeOracle::new(16);
        let index = VectorIndex::open(&layout, 16).unwrap();
        let chunks = vec![chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")];
        let added = index.build(&chunks, &oracle).unwrap();
        assert_eq!(added, 3);

        let query = oracle.embed("alpha").unwrap();
        let results = index.search(&query, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.chunk_index, 0);
        assert_eq!(results[0].0.text, "alpha");
    }

    #[test]
    fn build_skips_already_indexed_chunks() {
        let (_tmp, layout) = layout();
        let oracle = FakeOracle::new(16);
        let index = VectorIndex::open(&layout, 16).unwrap();
        let chunks = vec![chunk(0, "alpha")];
        assert_eq!(index.build(&chunks, &oracle).unwrap(), 1);
        assert_eq!(index.build(&chunks, &oracle).unwrap(), 0);
    }

    #[test]
    fn recovery_truncates_dangling_vector_bytes() {
        let (_tmp, layout) = layout();
        let index = VectorIndex::open(&layout, 4).unwrap();
        // Simulate a crash after a vector write but before its metadata line.
        let mut file = OpenOptions::new()
            .append(true)
            .open(layout.index_vectors())
            .unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        drop(file);

        let _recovered = VectorIndex::open(&layout, 4).unwrap();
        let len = std::fs::metadata(layout.index_vectors()).unwrap().len();
        assert_eq!(len, 0);
        let _ = index.metadata_len();
    }

    #[test]
    fn rebuild_replaces_index_atomically() {
        let (_tmp, layout) = layout();
        let oracle = FakeOracle::new(16);
        let chunks = vec![chunk(0, "alpha"), chunk(1, "beta")];
        let index = VectorIndex::rebuild(&layout, &chunks, &oracle).unwrap();
        assert_eq!(index.metadata_len().unwrap(), 2);
        assert!(!layout.index_vectors_new().exists());
        assert!(!layout.index_metadata_new().exists());
    }

    #[test]
    fn search_on_empty_index_returns_empty() {
        let (_tmp, layout) = layout();
        let index = VectorIndex::open(&layout, 8).unwrap();
        let results = index.search(&[0.0; 8], 5).unwrap();
        assert!(results.is_empty());
    }
}
