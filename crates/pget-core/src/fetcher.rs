//! Single-job HTTP Range GET, chunked into the shared channel.
//!
//! One fetcher handles one job at a time: it issues a ranged GET against its
//! assigned source URL and feeds fixed-size chunks to the disk writer through
//! a bounded channel. A blocking `send` on a full channel is the backpressure
//! valve that caps in-flight memory.

use crate::chunk::DataChunk;
use crate::planner::Job;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Error from a single range fetch. Any of these aborts the whole session;
/// the persisted progress record makes a later re-run resume correctly.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    #[error("chunk channel closed before the job finished")]
    ChannelClosed,
}

/// Per-fetch settings, threaded from config at session start.
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub chunk_size: u64,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// Accumulates response bytes into chunk-sized buffers.
///
/// A single network read may deliver fewer bytes than a chunk, so bytes are
/// buffered until a full `chunk_size` is collected; a short chunk is emitted
/// only when the stream ends. Each chunk's start offset advances by the bytes
/// actually emitted before it, keeping boundaries correct for the short tail.
struct ChunkAssembler {
    chunk_size: u64,
    next_start: u64,
    buf: Vec<u8>,
    emitted: u64,
    tx: SyncSender<DataChunk>,
}

impl ChunkAssembler {
    fn new(job_start: u64, chunk_size: u64, tx: SyncSender<DataChunk>) -> Self {
        ChunkAssembler {
            chunk_size,
            next_start: job_start,
            buf: Vec::with_capacity(chunk_size as usize),
            emitted: 0,
            tx,
        }
    }

    fn push(&mut self, mut data: &[u8]) -> Result<(), FetchError> {
        while !data.is_empty() {
            let room = self.chunk_size as usize - self.buf.len();
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == self.chunk_size as usize {
                self.emit()?;
            }
        }
        Ok(())
    }

    fn emit(&mut self) -> Result<(), FetchError> {
        let bytes = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size as usize));
        let len = bytes.len() as u64;
        let chunk = DataChunk::new(bytes, self.next_start, self.chunk_size);
        // Blocks when the channel is full; the writer draining frees a slot.
        self.tx.send(chunk).map_err(|_| FetchError::ChannelClosed)?;
        self.next_start += len;
        self.emitted += len;
        Ok(())
    }

    /// Flush the trailing short chunk, if any; returns total bytes emitted.
    fn finish(&mut self) -> Result<u64, FetchError> {
        if !self.buf.is_empty() {
            self.emit()?;
        }
        Ok(self.emitted)
    }
}

/// Status code from an HTTP status line (e.g. `HTTP/1.1 206 Partial Content`).
fn parse_status_line(line: &str) -> Option<u32> {
    line.strip_prefix("HTTP/")?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// Fetch one job: GET with `Range: bytes=start-end`, emitting chunks to `tx`.
///
/// The response must be `206 Partial Content` — a server that ignores the
/// range and answers 200 with the full body would have its bytes assembled at
/// the wrong offsets, so body data is refused before the first chunk is
/// emitted. The transfer must also deliver exactly the job's byte count;
/// anything less (a server closing early) is an error rather than silent
/// corruption.
pub fn fetch(
    url: &str,
    job: Job,
    opts: &FetcherOptions,
    tx: SyncSender<DataChunk>,
) -> Result<(), FetchError> {
    let assembler = Arc::new(Mutex::new(ChunkAssembler::new(job.start, opts.chunk_size, tx)));
    let assembler_cb = Arc::clone(&assembler);
    let send_failure: Arc<Mutex<Option<FetchError>>> = Arc::new(Mutex::new(None));
    let send_failure_cb = Arc::clone(&send_failure);
    // Set from the header callback so the write callback can refuse body
    // bytes of a non-206 response; redirects overwrite it per header block.
    let status: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));
    let status_hdr = Arc::clone(&status);
    let status_body = Arc::clone(&status);

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(opts.connect_timeout)?;
    // Read timeout: abort when the stream delivers less than one byte per
    // second for `read_timeout`.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(opts.read_timeout)?;
    easy.range(&job.range_value())?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(move |line| {
            if let Some(code) = std::str::from_utf8(line).ok().and_then(parse_status_line) {
                *status_hdr.lock().unwrap() = Some(code);
            }
            true
        })?;
        transfer.write_function(move |data| {
            let code = status_body.lock().unwrap().unwrap_or(0);
            if code != 206 {
                let _ = send_failure_cb.lock().unwrap().replace(FetchError::Http(code));
                return Ok(0);
            }
            match assembler_cb.lock().unwrap().push(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    let _ = send_failure_cb.lock().unwrap().replace(e);
                    Ok(0)
                }
            }
        })?;
        if let Err(e) = transfer.perform() {
            if e.is_write_error() {
                if let Some(err) = send_failure.lock().unwrap().take() {
                    return Err(err);
                }
            }
            return Err(FetchError::Curl(e));
        }
    }

    let code = easy.response_code()?;
    if code != 206 {
        return Err(FetchError::Http(code));
    }

    let received = assembler.lock().unwrap().finish()?;
    if received != job.len() {
        return Err(FetchError::PartialTransfer {
            expected: job.len(),
            received,
        });
    }
    Ok(())
}
