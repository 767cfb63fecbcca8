//! Resumable progress: per-chunk completion record and its sidecar file.
//!
//! The record tracks which chunks of the output file are durably written; the
//! store persists it next to the output as `<output>.meta` with an atomic
//! temp-then-rename protocol so a crash never leaves a half-written sidecar.

mod record;
mod store;

pub use record::{ChunkState, ProgressRecord};
pub use store::ProgressStore;
