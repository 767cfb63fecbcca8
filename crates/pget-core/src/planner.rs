//! Job planning: turns the missing chunks of a file into non-overlapping
//! byte-range jobs sized to the available concurrency.
//!
//! The planner reads the progress record exactly once, before the worker pool
//! starts; jobs are never re-planned or re-queued for the lifetime of a
//! session.

use crate::progress::ProgressRecord;

/// One contiguous byte range `[start, end]` (inclusive end) of missing
/// content, fetched by exactly one worker with one HTTP range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub start: u64,
    pub end: u64,
}

impl Job {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for `CURLOPT_RANGE`: `start-end`, both inclusive.
    pub fn range_value(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Downgrade the requested concurrency to 1 when at most one chunk of work
/// remains; parallelizing a single chunk only adds connection overhead.
pub fn effective_concurrency(requested: usize, remaining_bytes: u64, chunk_size: u64) -> usize {
    if remaining_bytes <= chunk_size {
        1
    } else {
        requested.max(1)
    }
}

/// Plan jobs covering exactly the not-done chunks of `record`, in order.
///
/// Maximal runs of not-done chunks ("gaps") are scanned left to right. With
/// `concurrency == 1` each gap becomes one job; otherwise gaps are subdivided
/// into sub-ranges of a shared target size of
/// `max(1, not_done_bytes / (chunk_size * concurrency))` chunk units, so the
/// job count approximates the concurrency however fragmented the gaps are.
/// The final job is clipped to `file_size - 1`.
pub fn plan(
    record: &ProgressRecord,
    file_size: u64,
    chunk_size: u64,
    concurrency: usize,
) -> Vec<Job> {
    let total = record.total_chunks();
    let not_done_bytes = file_size - record.done_bytes(file_size, chunk_size);
    if not_done_bytes == 0 {
        return Vec::new();
    }

    let target_job_chunks =
        (not_done_bytes / (chunk_size * concurrency.max(1) as u64)).max(1) as usize;

    let mut jobs = Vec::new();
    let mut i = 0;
    while i < total {
        if record.is_done(i) {
            i += 1;
            continue;
        }
        let gap_start = i;
        while i < total && !record.is_done(i) {
            i += 1;
        }
        let gap_end = i; // exclusive chunk index

        if concurrency == 1 {
            jobs.push(job_for_chunks(gap_start, gap_end, chunk_size, file_size));
        } else {
            let mut cur = gap_start;
            while cur < gap_end {
                let end = (cur + target_job_chunks).min(gap_end);
                jobs.push(job_for_chunks(cur, end, chunk_size, file_size));
                cur = end;
            }
        }
    }
    jobs
}

fn job_for_chunks(first: usize, last_excl: usize, chunk_size: u64, file_size: u64) -> Job {
    let start = first as u64 * chunk_size;
    let end = (last_excl as u64 * chunk_size).min(file_size) - 1;
    Job { start, end }
}
