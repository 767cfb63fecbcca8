//! Disk writer: drains the chunk channel, writes each chunk at its absolute
//! offset, and commits progress after every chunk.
//!
//! The writer is the only component that touches the output file handle and
//! the only mutator of the progress record, so no write-write race on either
//! is possible. Each mark-done-and-persist fully completes before the next
//! chunk is dequeued, keeping the sidecar a valid snapshot of durably
//! completed work.

use anyhow::{anyhow, bail, Context, Result};
use std::fs::File;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::mpsc::Receiver;

use crate::chunk::DataChunk;
use crate::progress::{ProgressRecord, ProgressStore};

/// Output file opened for random-access writes. Created if missing, never
/// truncated: a resumed session keeps the chunks already on disk.
pub struct OutputFile {
    file: File,
}

impl OutputFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open output file {}", path.display()))?;
        Ok(OutputFile { file })
    }

    /// Write `data` at `offset` without moving a shared cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .context("output write failed")
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone().context("output clone failed")?;
        f.seek(SeekFrom::Start(offset)).context("output seek failed")?;
        f.write_all(data).context("output write failed")
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("output sync failed")
    }
}

/// Tracks the truncated integer download percentage, reporting each value at
/// most once, in increasing order.
#[derive(Debug)]
pub struct PercentTracker {
    total: u64,
    bytes: u64,
    last: u64,
}

impl PercentTracker {
    pub fn new(total: u64, initial_bytes: u64) -> Self {
        let mut t = PercentTracker {
            total,
            bytes: initial_bytes,
            last: 0,
        };
        t.last = t.percent();
        t
    }

    fn percent(&self) -> u64 {
        if self.total == 0 {
            100
        } else {
            self.bytes * 100 / self.total
        }
    }

    /// Account `n` more bytes; returns the new percentage when the truncated
    /// integer value changed.
    pub fn advance(&mut self, n: u64) -> Option<u64> {
        self.bytes += n;
        let p = self.percent();
        if p != self.last {
            self.last = p;
            Some(p)
        } else {
            None
        }
    }

    /// Returns 100 unless it was already reported through `advance`.
    pub fn finish(&mut self) -> Option<u64> {
        if self.last == 100 {
            None
        } else {
            self.last = 100;
            Some(100)
        }
    }
}

/// Single disk-writing sink for all fetchers.
pub struct DiskWriter {
    output: OutputFile,
    store: ProgressStore,
    record: ProgressRecord,
    rx: Receiver<DataChunk>,
    tracker: PercentTracker,
}

impl DiskWriter {
    pub fn new(
        output: OutputFile,
        store: ProgressStore,
        record: ProgressRecord,
        rx: Receiver<DataChunk>,
        tracker: PercentTracker,
    ) -> Self {
        DiskWriter {
            output,
            store,
            record,
            rx,
            tracker,
        }
    }

    /// Run until every chunk is written and persisted, then delete the
    /// sidecar. Returns an error if the channel closes while chunks are still
    /// missing (a fetcher failed); the sidecar then reflects exactly the work
    /// committed so far.
    pub fn drain(mut self) -> Result<()> {
        let total = self.record.total_chunks();
        let mut done = self.record.done_count();

        while done < total {
            let chunk = self.rx.recv().map_err(|_| {
                anyhow!(
                    "chunk channel closed with {} of {} chunks written",
                    done,
                    total
                )
            })?;
            if chunk.index >= total {
                bail!("chunk index {} out of range ({} total)", chunk.index, total);
            }
            if self.record.is_done(chunk.index) {
                tracing::warn!(index = chunk.index, "duplicate chunk ignored");
                continue;
            }

            self.output.write_at(chunk.start, &chunk.data)?;
            self.record.mark_done(chunk.index);
            self.store.persist(&self.record)?;
            done += 1;

            if let Some(p) = self.tracker.advance(chunk.len() as u64) {
                println!("Downloaded {}%", p);
            }
        }

        self.output.sync()?;
        if let Some(p) = self.tracker.finish() {
            println!("Downloaded {}%", p);
        }
        self.store.finalize()?;
        tracing::info!(chunks = total, "download complete, sidecar removed");
        println!("Download succeeded");
        Ok(())
    }
}
