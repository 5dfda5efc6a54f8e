//! Operation log backups
//!
//! [`LogStore`] owns the live operation log file and the directory of
//! timestamped `*.bak` snapshots next to it. Every backup name coming from
//! a caller is checked here, whatever the calling layer already did:
//! the resolved path must sit directly inside the backup directory.

use crate::config::AppPaths;
use crate::error::BackupError;
use crate::logging::FileOperationLog;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix of generated backup names
pub const BACKUP_PREFIX: &str = "context_menu_";

/// Suffix of generated backup names
pub const BACKUP_SUFFIX: &str = ".log.bak";

/// Lines returned by [`LogStore::tail`] when the caller has no preference
pub const DEFAULT_TAIL_LINES: usize = 10;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One snapshot in the backup directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// File name inside the backup directory
    pub filename: String,
    /// Last modification time
    pub created: DateTime<Local>,
    /// Size in bytes
    pub size: u64,
    /// Number of lines
    pub lines: usize,
}

/// End of the live log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTail {
    /// Last lines, oldest first
    pub lines: Vec<String>,
    /// Total lines in the live log
    pub total: usize,
    /// Number of backups available
    pub backup_count: usize,
}

/// Live log plus its backups
///
/// Clones share one lock with every [`FileOperationLog`] handed out by
/// [`operation_log`](LogStore::operation_log); clear, restore and appends
/// never interleave.
#[derive(Debug, Clone)]
pub struct LogStore {
    paths: AppPaths,
    write_lock: Arc<Mutex<()>>,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> BackupError + '_ {
    move |source| BackupError::io_error(path, source)
}

fn count_lines(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes).lines().count()
}

fn is_backup_name(name: &str) -> bool {
    name.ends_with(".bak")
}

/// Lexical checks on a caller-supplied backup name
fn check_name(name: &str) -> Result<(), BackupError> {
    let reason = if name.trim().is_empty() {
        "empty name"
    } else if name.contains(['/', '\\']) {
        "must not contain path separators"
    } else if name == "." || name == ".." {
        "must not be a relative path segment"
    } else if name.contains(':') {
        "must not contain a drive or stream prefix"
    } else if name.chars().any(char::is_control) {
        "must not contain control characters"
    } else if !is_backup_name(name) {
        "not a backup file"
    } else {
        return Ok(());
    };
    Err(BackupError::invalid_name(name, reason))
}

/// Write `bytes` to a sibling temp file, then rename it over `target`
fn replace_file(target: &Path, bytes: &[u8]) -> Result<(), BackupError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let file_name = target
        .file_name()
        .map_or_else(|| "file".into(), |n| n.to_string_lossy());
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let written = write_synced(&tmp, bytes).and_then(|()| fs::rename(&tmp, target));
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
            }
        }
        return Err(BackupError::io_error(target, err));
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl LogStore {
    /// Create store over `paths`; nothing is touched until first use
    #[must_use]
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            write_lock: Arc::default(),
        }
    }

    /// Paths in use
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Operation log appending to the live log file under the store's lock
    #[must_use]
    pub fn operation_log(&self) -> FileOperationLog {
        FileOperationLog::with_lock(&self.paths.log_file, Arc::clone(&self.write_lock))
    }

    /// Snapshot the live log into a new backup, then empty it
    ///
    /// The backup is complete before the log is truncated; if truncation
    /// fails the new backup is removed again and the log is left as it was.
    /// A missing log is backed up as an empty snapshot.
    ///
    /// # Errors
    /// `BackupError::Io` naming the path that failed.
    pub fn clear_log(&self) -> Result<BackupMetadata, BackupError> {
        let _guard = self.write_lock.lock();
        let log_file = &self.paths.log_file;
        let content = match fs::read(log_file) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(BackupError::io_error(log_file, err)),
        };

        let backup_dir = &self.paths.backup_dir;
        fs::create_dir_all(backup_dir).map_err(io_err(backup_dir))?;
        let target = self.unique_backup_path(Local::now());
        replace_file(&target, &content)?;

        let truncated = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(log_file);
        if let Err(err) = truncated {
            if let Err(cleanup) = fs::remove_file(&target) {
                tracing::warn!(path = %target.display(), error = %cleanup, "failed to roll back backup");
            }
            return Err(BackupError::io_error(log_file, err));
        }

        let metadata = describe(&target)?;
        tracing::info!(
            backup = %metadata.filename,
            lines = metadata.lines,
            "operation log cleared"
        );
        Ok(metadata)
    }

    /// Every `*.bak` in the backup directory, newest first
    ///
    /// # Errors
    /// `BackupError::Io` when the directory or a backup cannot be read.
    pub fn list_backups(&self) -> Result<Vec<BackupMetadata>, BackupError> {
        let mut backups = self
            .backup_files()?
            .iter()
            .map(|path| describe(path))
            .collect::<Result<Vec<_>, _>>()?;
        backups.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(backups)
    }

    /// Metadata of one backup, resolved the same way restore and delete do
    ///
    /// # Errors
    /// As [`restore_backup`](Self::restore_backup).
    pub fn backup_info(&self, filename: &str) -> Result<BackupMetadata, BackupError> {
        describe(&self.resolve_backup(filename)?)
    }

    /// Overwrite the live log with a backup; the backup is kept
    ///
    /// # Errors
    /// - `BackupError::InvalidName` for names escaping the backup directory
    /// - `BackupError::NotFound` when no such backup exists
    /// - `BackupError::Io` when reading or replacing fails
    pub fn restore_backup(&self, filename: &str) -> Result<(), BackupError> {
        let _guard = self.write_lock.lock();
        let source = self.resolve_backup(filename)?;
        let content = fs::read(&source).map_err(io_err(&source))?;
        replace_file(&self.paths.log_file, &content)?;
        tracing::info!(backup = filename, lines = count_lines(&content), "operation log restored");
        Ok(())
    }

    /// Permanently remove a backup
    ///
    /// # Errors
    /// As [`restore_backup`](Self::restore_backup).
    pub fn delete_backup(&self, filename: &str) -> Result<(), BackupError> {
        let _guard = self.write_lock.lock();
        let path = self.resolve_backup(filename)?;
        fs::remove_file(&path).map_err(io_err(&path))?;
        tracing::info!(backup = filename, "backup deleted");
        Ok(())
    }

    /// Last `n` lines of the live log with totals
    ///
    /// # Errors
    /// `BackupError::Io` when the log or backup directory cannot be read.
    pub fn tail(&self, n: usize) -> Result<LogTail, BackupError> {
        let log_file = &self.paths.log_file;
        let content = match fs::read(log_file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(BackupError::io_error(log_file, err)),
        };
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(n);
        Ok(LogTail {
            lines: all[start..].iter().map(ToString::to_string).collect(),
            total: all.len(),
            backup_count: self.backup_files()?.len(),
        })
    }

    fn unique_backup_path(&self, now: DateTime<Local>) -> PathBuf {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let mut candidate = self
            .paths
            .backup_dir
            .join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .paths
                .backup_dir
                .join(format!("{BACKUP_PREFIX}{stamp}_{n}{BACKUP_SUFFIX}"));
            n += 1;
        }
        candidate
    }

    fn backup_files(&self) -> Result<Vec<PathBuf>, BackupError> {
        let dir = &self.paths.backup_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(BackupError::io_error(dir, err)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_err(dir))?.path();
            let is_backup = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_backup_name);
            if is_backup && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Resolve a caller-supplied name to a backup strictly inside the directory
    fn resolve_backup(&self, filename: &str) -> Result<PathBuf, BackupError> {
        check_name(filename)?;
        let not_found = || BackupError::NotFound(filename.to_string());

        let dir = match fs::canonicalize(&self.paths.backup_dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(BackupError::io_error(&self.paths.backup_dir, err)),
        };
        let candidate = dir.join(filename);
        let resolved = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(err) => return Err(BackupError::io_error(candidate, err)),
        };

        if resolved.parent() != Some(dir.as_path()) {
            tracing::warn!(name = filename, resolved = %resolved.display(), "backup name escapes backup directory");
            return Err(BackupError::invalid_name(
                filename,
                "resolves outside the backup directory",
            ));
        }
        if !resolved.is_file() {
            return Err(not_found());
        }
        Ok(resolved)
    }
}

fn describe(path: &Path) -> Result<BackupMetadata, BackupError> {
    let metadata = fs::metadata(path).map_err(io_err(path))?;
    let modified = metadata.modified().map_err(io_err(path))?;
    let bytes = fs::read(path).map_err(io_err(path))?;
    Ok(BackupMetadata {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        created: DateTime::<Local>::from(modified),
        size: metadata.len(),
        lines: count_lines(&bytes),
    })
}
