//! Sidecar persistence with crash-safe replace.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::ProgressRecord;

/// Suffix appended to the output path for the sidecar file.
pub const SIDECAR_SUFFIX: &str = ".meta";

const TEMP_SUFFIX: &str = ".tmp";

/// Owns the on-disk location of the progress record for one download.
///
/// The sidecar's presence at startup signals a resumable partial download; its
/// absence signals either "never started" or "already complete".
#[derive(Debug, Clone)]
pub struct ProgressStore {
    sidecar_path: PathBuf,
}

impl ProgressStore {
    /// Store for the sidecar next to `output_path` (e.g. `file.iso.meta`).
    pub fn for_output(output_path: &Path) -> Self {
        let mut p = output_path.as_os_str().to_owned();
        p.push(SIDECAR_SUFFIX);
        ProgressStore {
            sidecar_path: PathBuf::from(p),
        }
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut p = self.sidecar_path.as_os_str().to_owned();
        p.push(TEMP_SUFFIX);
        PathBuf::from(p)
    }

    /// Load the persisted record, or `None` when no sidecar exists.
    ///
    /// A sidecar that exists but cannot be parsed, or whose chunk count does
    /// not match the current file size, is an error: silently restarting from
    /// zero could re-download and overwrite chunks believed missing.
    pub fn load(&self, expected_chunks: usize) -> Result<Option<ProgressRecord>> {
        let data = match fs::read_to_string(&self.sidecar_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read sidecar {}", self.sidecar_path.display())
                })
            }
        };
        let record: ProgressRecord = serde_json::from_str(&data).with_context(|| {
            format!(
                "corrupt progress sidecar {}; delete it to restart from scratch",
                self.sidecar_path.display()
            )
        })?;
        if !record.is_valid_for(expected_chunks) {
            bail!(
                "progress sidecar {} does not match the remote file ({} chunks recorded, {} expected); \
                 delete it to restart from scratch",
                self.sidecar_path.display(),
                record.total_chunks(),
                expected_chunks
            );
        }
        Ok(Some(record))
    }

    /// Durably persist the full record: serialize to `<sidecar>.tmp`, sync,
    /// then remove-and-rename over the canonical path. Never an in-place
    /// overwrite, so a crash mid-write leaves the prior valid record (or none)
    /// readable.
    pub fn persist(&self, record: &ProgressRecord) -> Result<()> {
        let tmp = self.temp_path();
        let json = serde_json::to_string(record).context("failed to serialize progress record")?;
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            f.write_all(json.as_bytes())
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            f.sync_all()
                .with_context(|| format!("failed to sync {}", tmp.display()))?;
        }
        match fs::remove_file(&self.sidecar_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to replace sidecar {}", self.sidecar_path.display())
                })
            }
        }
        fs::rename(&tmp, &self.sidecar_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                tmp.display(),
                self.sidecar_path.display()
            )
        })?;
        Ok(())
    }

    /// Delete the sidecar once the download is fully complete. Its absence is
    /// the durable signal that no resumable state exists.
    pub fn finalize(&self) -> Result<()> {
        match fs::remove_file(&self.sidecar_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to delete sidecar {}", self.sidecar_path.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ProgressStore {
        ProgressStore::for_output(&dir.join("file.bin"))
    }

    #[test]
    fn sidecar_path_appends_meta() {
        let s = ProgressStore::for_output(Path::new("/tmp/file.iso"));
        assert_eq!(s.sidecar_path().to_string_lossy(), "/tmp/file.iso.meta");
    }

    #[test]
    fn load_absent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        assert!(s.load(5).unwrap().is_none());
    }

    #[test]
    fn persist_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        let mut r = ProgressRecord::new(5);
        r.mark_done(0);
        r.mark_done(3);
        s.persist(&r).unwrap();

        let loaded = s.load(5).unwrap().expect("sidecar present");
        assert!(loaded.is_done(0));
        assert!(!loaded.is_done(1));
        assert!(loaded.is_done(3));
        assert_eq!(loaded.done_count(), 2);
    }

    #[test]
    fn persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        s.persist(&ProgressRecord::new(2)).unwrap();
        assert!(s.sidecar_path().exists());
        assert!(!s.temp_path().exists());
    }

    #[test]
    fn stale_temp_file_does_not_shadow_valid_sidecar() {
        // A crash between temp write and rename leaves a temp file behind;
        // the canonical sidecar must still load.
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        let mut r = ProgressRecord::new(3);
        r.mark_done(2);
        s.persist(&r).unwrap();

        fs::write(s.temp_path(), b"half-written garbage").unwrap();
        let loaded = s.load(3).unwrap().expect("sidecar present");
        assert!(loaded.is_done(2));

        // The next persist replaces both.
        r.mark_done(0);
        s.persist(&r).unwrap();
        assert!(!s.temp_path().exists());
        assert_eq!(s.load(3).unwrap().unwrap().done_count(), 2);
    }

    #[test]
    fn corrupt_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        fs::write(s.sidecar_path(), b"not json at all").unwrap();
        let err = s.load(5).unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn chunk_count_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        s.persist(&ProgressRecord::new(5)).unwrap();
        let err = s.load(6).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn finalize_removes_sidecar_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let s = store_in(dir.path());
        s.persist(&ProgressRecord::new(1)).unwrap();
        s.finalize().unwrap();
        assert!(!s.sidecar_path().exists());
        s.finalize().unwrap();
    }
}
