//! In-memory completion record, one state per chunk.

use serde::{Deserialize, Serialize};

/// Completion state of one chunk. There is no persisted in-progress state: a
/// chunk is either durably written or treated as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkState {
    Unknown,
    Done,
}

/// Per-chunk completion record. Length is fixed at creation from the file
/// size and never changes; a `Done` flag is never reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    total_chunks: usize,
    chunks: Vec<ChunkState>,
}

impl ProgressRecord {
    /// All-unknown record for a file of `total_chunks` chunks.
    pub fn new(total_chunks: usize) -> Self {
        ProgressRecord {
            total_chunks,
            chunks: vec![ChunkState::Unknown; total_chunks],
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// True when the serialized form is internally consistent and matches the
    /// chunk count expected for the current file size.
    pub fn is_valid_for(&self, expected_chunks: usize) -> bool {
        self.total_chunks == expected_chunks && self.chunks.len() == expected_chunks
    }

    pub fn is_done(&self, index: usize) -> bool {
        matches!(self.chunks.get(index), Some(ChunkState::Done))
    }

    pub fn mark_done(&mut self, index: usize) {
        self.chunks[index] = ChunkState::Done;
    }

    pub fn done_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|s| **s == ChunkState::Done)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.done_count() == self.total_chunks
    }

    /// Bytes covered by done chunks, accounting for the short final chunk.
    pub fn done_bytes(&self, file_size: u64, chunk_size: u64) -> u64 {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ChunkState::Done)
            .map(|(i, _)| {
                let start = i as u64 * chunk_size;
                chunk_size.min(file_size.saturating_sub(start))
            })
            .sum()
    }
}
