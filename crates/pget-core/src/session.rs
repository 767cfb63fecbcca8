//! Session driver: wires probe, planning, the worker pool and the writer
//! together for one download.
//!
//! Fetchers and the writer communicate only through one bounded channel; the
//! job queue is populated once and drained by the pool. On any fetch error the
//! queue is cleared so no new jobs start, in-flight state winds down, and the
//! first error is returned with the sidecar left at the last committed chunk.

use anyhow::{anyhow, ensure, Context, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::chunk;
use crate::config::PgetConfig;
use crate::fetcher::{self, FetchError, FetcherOptions};
use crate::planner::{self, Job};
use crate::probe;
use crate::progress::{ProgressRecord, ProgressStore};
use crate::url_model;
use crate::writer::{DiskWriter, OutputFile, PercentTracker};

/// One download session: source mirrors of the same resource, a concurrency
/// cap, and the directory the output lands in.
pub struct Session {
    pub urls: Vec<String>,
    pub connections: usize,
    pub config: PgetConfig,
    pub download_dir: PathBuf,
}

impl Session {
    /// Run the download to completion, resuming from a sidecar if present.
    pub fn run(&self) -> Result<()> {
        ensure!(!self.urls.is_empty(), "no source URLs given");
        ensure!(self.config.chunk_size > 0, "chunk_size must be positive");
        let chunk_size = self.config.chunk_size;
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let read_timeout = Duration::from_secs(self.config.read_timeout_secs);

        let first_url = &self.urls[0];
        let head = probe::probe(first_url, connect_timeout, read_timeout)
            .with_context(|| format!("could not probe {}", first_url))?;
        let file_size = head
            .content_length
            .context("server did not report a content length")?;
        if !head.accept_ranges {
            tracing::warn!(url = %first_url, "server does not advertise byte-range support");
        }

        let output_path = self.download_dir.join(url_model::derive_filename(first_url));
        let store = ProgressStore::for_output(&output_path);
        let total = chunk::total_chunks(file_size, chunk_size);
        tracing::info!(
            url = %first_url,
            file_size,
            chunk_size,
            total_chunks = total,
            output = %output_path.display(),
            "session start"
        );

        let record = match store.load(total)? {
            Some(record) => {
                tracing::info!(
                    done = record.done_count(),
                    total,
                    "resuming from sidecar"
                );
                record
            }
            None => {
                if output_matches_size(&output_path, file_size) && file_size > 0 {
                    tracing::info!("output already complete, nothing to do");
                    println!("Downloaded 100%");
                    println!("Download succeeded");
                    return Ok(());
                }
                ProgressRecord::new(total)
            }
        };

        if record.is_complete() {
            // Zero-length resource, or a fully-done sidecar left behind.
            let output = OutputFile::open(&output_path)?;
            output.sync()?;
            store.finalize()?;
            println!("Downloaded 100%");
            println!("Download succeeded");
            return Ok(());
        }

        let done_bytes = record.done_bytes(file_size, chunk_size);
        let threads = planner::effective_concurrency(
            self.connections,
            file_size - done_bytes,
            chunk_size,
        );
        let jobs = planner::plan(&record, file_size, chunk_size, threads);

        if threads == 1 {
            println!("Downloading...");
        } else {
            println!("Downloading using {} connections...", threads);
        }

        let output = OutputFile::open(&output_path)?;
        let (tx, rx) = sync_channel(total.max(1));
        let tracker = PercentTracker::new(file_size, done_bytes);
        let writer = DiskWriter::new(output, store, record, rx, tracker);
        let writer_handle = thread::spawn(move || writer.drain());

        // Jobs round-robin across mirrors in plan order, dispatched through a
        // shared queue drained by the pool.
        let queue: VecDeque<(Job, String)> = jobs
            .iter()
            .enumerate()
            .map(|(i, job)| (*job, self.urls[i % self.urls.len()].clone()))
            .collect();
        let queue = Arc::new(Mutex::new(queue));
        let first_error: Arc<Mutex<Option<FetchError>>> = Arc::new(Mutex::new(None));
        let opts = FetcherOptions {
            chunk_size,
            connect_timeout,
            read_timeout,
        };

        let workers = threads.min(jobs.len());
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let first_error = Arc::clone(&first_error);
            let tx = tx.clone();
            let opts = opts.clone();
            handles.push(thread::spawn(move || loop {
                let (job, url) = match queue.lock().unwrap().pop_front() {
                    Some(pair) => pair,
                    None => break,
                };
                tracing::debug!(start = job.start, end = job.end, %url, "fetching range");
                if let Err(e) = fetcher::fetch(&url, job, &opts, tx.clone()) {
                    tracing::error!(start = job.start, end = job.end, %url, error = %e, "range fetch failed");
                    queue.lock().unwrap().clear();
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    break;
                }
            }));
        }
        drop(tx);

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("fetch worker panicked"))?;
        }
        let writer_result = writer_handle
            .join()
            .map_err(|_| anyhow!("writer thread panicked"))?;

        if let Some(e) = first_error.lock().unwrap().take() {
            // A closed channel at a fetcher means the writer went away first;
            // the writer's own error is the root cause then, not the fetch.
            if matches!(e, FetchError::ChannelClosed) {
                writer_result.context("download failed; progress saved, re-run to resume")?;
            }
            return Err(anyhow::Error::new(e))
                .context("download failed; progress saved, re-run to resume");
        }
        writer_result
    }
}

/// Heuristic completion check for the no-sidecar case: the output exists at
/// exactly the remote size. A sidecar deleted mid-download defeats this, so
/// restarting from scratch means deleting the output too.
fn output_matches_size(path: &Path, file_size: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() == file_size)
        .unwrap_or(false)
}
