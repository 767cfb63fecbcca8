//! Chunk math and the in-flight data chunk type.
//!
//! A chunk is the fixed-size unit of transfer and of progress tracking; the
//! final chunk of a file may be shorter. Chunk size comes from config and is
//! threaded through constructors, never a global.

/// Number of chunks needed to cover `file_size` bytes: `ceil(file_size / chunk_size)`.
pub fn total_chunks(file_size: u64, chunk_size: u64) -> usize {
    debug_assert!(chunk_size > 0);
    ((file_size + chunk_size - 1) / chunk_size) as usize
}

/// Chunk index for the chunk starting at `offset`: `ceil(offset / chunk_size)`.
///
/// Every chunk the fetcher emits starts on a chunk boundary, where rounding up
/// equals rounding down; the two only diverge for a mid-chunk offset.
pub fn index_for_offset(offset: u64, chunk_size: u64) -> usize {
    debug_assert!(chunk_size > 0);
    ((offset + chunk_size - 1) / chunk_size) as usize
}

/// One in-memory chunk in flight from a fetcher to the disk writer.
///
/// Owned by the producing fetcher until handed to the channel; after that the
/// writer is the sole owner.
#[derive(Debug)]
pub struct DataChunk {
    /// Chunk payload; `chunk_size` bytes except for the last chunk of a job.
    pub data: Vec<u8>,
    /// Absolute byte offset of the first payload byte in the output file.
    pub start: u64,
    /// Index into the progress record, derived from `start`.
    pub index: usize,
}

impl DataChunk {
    pub fn new(data: Vec<u8>, start: u64, chunk_size: u64) -> Self {
        let index = index_for_offset(start, chunk_size);
        DataChunk { data, start, index }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
