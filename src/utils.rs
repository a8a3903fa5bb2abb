//! Utility functions for log formatting and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging review text and page bodies
//! - File system validation for output locations
//! - Atomic file replacement for the store, report and catalogs

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` characters with an ellipsis and a
/// count of the omitted characters appended. Cuts always fall on a
/// character boundary, so Japanese text is safe to pass in.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"あ".repeat(50), 10), "ああああああああああ…(+40 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => {
            let omitted = s[cut..].chars().count();
            format!("{}…(+{} chars)", &s[..cut], omitted)
        }
    }
}

/// Directory that will hold `file`; `.` for bare file names.
pub fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a marker file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let marker_path = path.join("..__write_check__");
    fs::write(&marker_path, b"").await?;
    let _ = fs::remove_file(&marker_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Replace `path` with `contents` without ever leaving a half-written file.
///
/// The bytes go to a sibling temp file first, which is then renamed over
/// the destination.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), bytes = contents.len()))]
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).await?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let temp_path = dir.join(format!(".{}.tmp-{}", file_name, std::process::id()));

    fs::write(&temp_path, contents).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    debug!("Replaced file atomically");
    Ok(())
}
