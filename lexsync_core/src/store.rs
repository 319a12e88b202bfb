//! Atomic JSON persistence shared by both stores.
//!
//! Writes go to a temp file in the target directory, get fsynced, then
//! atomically rename over the destination so no partial file is ever
//! externally observable. Output is pretty-printed: both stores are
//! meant to be reviewed and diffed by humans.

use crate::{Error, Result};
use fs2::FileExt;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize `value` and atomically replace the file at `path`.
///
/// Any write or rename failure surfaces as [`Error::Persist`].
pub(crate) fn save_json_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    // Ensure parent directory exists
    let parent = path
        .parent()
        .ok_or_else(|| Error::Persist(format!("{what} path {path:?} has no parent directory")))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| Error::Persist(format!("creating directory for {what}: {e}")))?;

    // Create unique temp file in the same directory for atomic rename
    let temp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::Persist(format!("creating temp file for {what}: {e}")))?;

    // Acquire exclusive lock on the temp file to serialize concurrent writers
    temp.as_file()
        .lock_exclusive()
        .map_err(|e| Error::Persist(format!("locking temp file for {what}: {e}")))?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Persist(format!("serializing {what}: {e}")))?;
        writer
            .write_all(contents.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|e| Error::Persist(format!("writing {what}: {e}")))?;
    }

    temp.as_file()
        .sync_all()
        .map_err(|e| Error::Persist(format!("syncing {what}: {e}")))?;
    temp.as_file()
        .unlock()
        .map_err(|e| Error::Persist(format!("unlocking temp file for {what}: {e}")))?;

    // Atomically replace the old file
    temp.persist(path)
        .map_err(|e| Error::Persist(format!("renaming {what} into place: {}", e.error)))?;

    tracing::debug!("Saved {} to {:?}", what, path);
    Ok(())
}
