//! On-disk layout: one file per cache key, holding the raw fetched bytes.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ResourceError, Result};

/// Replace path separators so a key can never escape the cache directory.
pub fn sanitize_key(key: &str) -> String {
    key.replace(['/', '\\'], "_")
}

/// Location of the cache file for `key` inside `cache_dir`.
pub fn cache_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(sanitize_key(key))
}

/// A regular file exists at `path` (directories don't count).
pub fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

pub fn read(path: &Path) -> io::Result<Vec<u8>> {
    std::fs::read(path)
}

/// Write `data` to `path`, creating parent directories as needed.
///
/// The bytes go to a temp file next to the target which is then renamed into
/// place, so readers never see a half-written file.
pub fn persist(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ResourceError::persistence(path, "cache file has no parent directory"))?;
    std::fs::create_dir_all(parent).map_err(|e| ResourceError::persistence(path, e))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|e| ResourceError::persistence(path, e))?;
    file.write_all(data)
        .map_err(|e| ResourceError::persistence(path, e))?;
    file.persist(path)
        .map_err(|e| ResourceError::persistence(path, e.error))?;
    Ok(())
}

/// Remove a single cache file. A file that is already gone is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Recursively delete the whole cache directory. Missing is fine.
pub fn remove_all(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(path = ?dir, "Removed cache directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Last modification time of the cache file, if it exists.
pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Human readable age of a cache file ("just now", "5m ago", "2h ago", "3d ago").
///
/// Hours and days round to the nearest unit; an age that rounds up to a full
/// day is shown in days.
pub fn age_display(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const HOUR: i64 = 60;
    const DAY: i64 = 24 * HOUR;

    // Negative ages are clock skew and count as fresh
    let minutes = (now - cached_at).num_minutes().max(0);
    let rounded = |unit: i64| (minutes + unit / 2) / unit;

    match minutes {
        0 => "just now".to_string(),
        m if m < HOUR => format!("{m}m ago"),
        _ if rounded(HOUR) < 24 => format!("{}h ago", rounded(HOUR)),
        _ => format!("{}d ago", rounded(DAY).max(1)),
    }
}
