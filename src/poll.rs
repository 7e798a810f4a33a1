//! One pass over the drop directory.
//!
//! [`scan`] hands the text of every regular file to a [`FileProcessor`] and
//! deletes the file afterwards when the processor succeeded and deletion is
//! enabled. Subdirectories and symbolic links are left alone. Entries are
//! visited in whatever order the filesystem yields them.
//!
//! A file that cannot be read aborts the rest of the scan; the caller
//! decides whether to try again on the next cycle. The error carries the
//! counters for the files already handled, since those may have been
//! published and deleted.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::contract::FileProcessor;

/// Counters for a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Regular files found in the directory.
    pub files_seen: usize,
    /// Files the processor reported as handled.
    pub processed: usize,
    /// Files the processor reported as failed; they stay on disk.
    pub failed: usize,
    pub deleted: usize,
    /// Handled files that could not be removed afterwards.
    pub delete_failures: usize,
}

impl PollOutcome {
    pub fn found_files(&self) -> bool {
        self.files_seen > 0
    }
}

#[derive(Debug)]
pub enum PollError {
    DirectoryNotFound(PathBuf),
    NotADirectory(PathBuf),
    /// Listing the directory failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Reading one file failed (including content that is not UTF-8).
    /// `partial` holds what the scan had already done before stopping.
    Read {
        path: PathBuf,
        source: std::io::Error,
        partial: PollOutcome,
    },
}

impl PollError {
    /// Whether this is a problem with the configured location rather than a
    /// transient I/O failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PollError::DirectoryNotFound(_) | PollError::NotADirectory(_)
        )
    }

    /// Counters for the files handled before a read failure ended the scan.
    pub fn partial_outcome(&self) -> Option<&PollOutcome> {
        match self {
            PollError::Read { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::DirectoryNotFound(path) => {
                write!(f, "message location does not exist: {}", path.display())
            }
            PollError::NotADirectory(path) => {
                write!(f, "message location is not a directory: {}", path.display())
            }
            PollError::Io { path, source } => {
                write!(f, "failed to list {}: {source}", path.display())
            }
            PollError::Read { path, source, .. } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Io { source, .. } | PollError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Fail fast unless `dir` exists and is a directory.
pub fn check_directory(dir: &Path) -> Result<(), PollError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PollError::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PollError::DirectoryNotFound(dir.to_path_buf()))
        }
        Err(e) => Err(PollError::Io {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Process every regular file in `dir` once.
pub async fn scan<F>(
    dir: &Path,
    processor: &F,
    delete_on_success: bool,
) -> Result<PollOutcome, PollError>
where
    F: FileProcessor + ?Sized,
{
    check_directory(dir)?;

    let entries = fs::read_dir(dir).map_err(|e| PollError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut outcome = PollOutcome::default();

    for entry_res in entries {
        let entry = entry_res.map_err(|e| PollError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        // file_type() does not follow symlinks
        let file_type = entry.file_type().map_err(|e| PollError::Io {
            path: path.clone(),
            source: e,
        })?;
        if !file_type.is_file() {
            debug!(path = %path.display(), "Skipping entry that is not a regular file");
            continue;
        }

        outcome.files_seen += 1;
        process_file(&path, processor, delete_on_success, &mut outcome).await?;
    }

    if !outcome.found_files() {
        info!(dir = %dir.display(), "No files found");
    }

    Ok(outcome)
}

async fn process_file<F>(
    path: &Path,
    processor: &F,
    delete_on_success: bool,
    outcome: &mut PollOutcome,
) -> Result<(), PollError>
where
    F: FileProcessor + ?Sized,
{
    info!(path = %path.display(), "Processing file");

    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to read file");
        PollError::Read {
            path: path.to_path_buf(),
            source: e,
            partial: *outcome,
        }
    })?;

    let result = processor.process(&content).await;
    if !result.is_success() {
        warn!(path = %path.display(), "Failed to process file, leaving it for the next poll");
        outcome.failed += 1;
        return Ok(());
    }

    outcome.processed += 1;
    info!(path = %path.display(), ?result, "File processed successfully");

    if !delete_on_success {
        debug!(path = %path.display(), "Deleting files is disabled, keeping file");
        return Ok(());
    }

    match fs::remove_file(path) {
        Ok(()) => {
            outcome.deleted += 1;
            debug!(path = %path.display(), "Deleted processed file");
        }
        Err(e) => {
            outcome.delete_failures += 1;
            warn!(error = ?e, path = %path.display(), "Failed to delete processed file");
        }
    }

    Ok(())
}
