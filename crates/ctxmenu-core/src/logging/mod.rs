//! Operation log
//!
//! Append-only, line-oriented record of every planned or executed registry
//! mutation. One line is enough to reconstruct the action: scope, key name,
//! full registry path and whether it was a dry run.

use crate::registry::Hive;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of registry action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpAction {
    /// Key created (or opened when it already existed)
    CreateKey,
    /// String value written
    SetValue,
    /// Key and its subtree deleted
    DeleteKey,
    /// Single value deleted
    DeleteValue,
    /// Nothing written; `detail` says why
    Skip,
    /// Explorer restart requested
    RestartShell,
}

impl OpAction {
    /// Stable name used in log lines
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateKey => "create_key",
            Self::SetValue => "set_value",
            Self::DeleteKey => "delete_key",
            Self::DeleteValue => "delete_value",
            Self::Skip => "skip",
            Self::RestartShell => "restart_shell",
        }
    }
}

/// One planned or executed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpRecord {
    /// Local time the record was built
    pub timestamp: DateTime<Local>,
    /// What was (or would be) done
    pub action: OpAction,
    /// Hive the path is relative to
    pub hive: Hive,
    /// Path relative to the hive
    pub path: String,
    /// Scope label, `classic_menu` for the Windows 11 marker
    pub scope: String,
    /// Menu entry key the mutation belongs to
    pub key_name: String,
    /// Value name and data, or a skip reason
    pub detail: Option<String>,
    /// Planned only; the registry was not touched
    pub dry_run: bool,
}

impl OpRecord {
    /// Create record stamped with the current local time
    #[must_use]
    pub fn new(
        action: OpAction,
        hive: Hive,
        path: impl Into<String>,
        scope: impl Into<String>,
        key_name: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            action,
            hive,
            path: path.into(),
            scope: scope.into(),
            key_name: key_name.into(),
            detail: None,
            dry_run,
        }
    }

    /// With detail text
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Hive-qualified registry path
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.hive.abbrev().to_string()
        } else {
            format!(r"{}\{}", self.hive.abbrev(), self.path)
        }
    }

    /// `[DRY-RUN]` for simulated records, `[APPLY]` otherwise
    #[must_use]
    pub fn tag(&self) -> &'static str {
        if self.dry_run {
            "[DRY-RUN]"
        } else {
            "[APPLY]"
        }
    }
}

impl fmt::Display for OpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} scope={} key={} path={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.tag(),
            self.action.as_str(),
            self.scope,
            self.key_name,
            self.full_path(),
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " {detail}")?;
        }
        Ok(())
    }
}

/// Append-only sink for [`OpRecord`]s
pub trait OperationLog: Send + Sync {
    /// Append one record
    ///
    /// # Errors
    /// Returns the underlying write error; callers log it and continue.
    fn append(&self, record: &OpRecord) -> io::Result<()>;
}

/// Operation log appending lines to a file
///
/// The file is opened per record so that backup/restore can replace it
/// between writes. Appends hold `write_lock`; anything replacing or
/// truncating the file must hold the same lock.
#[derive(Debug, Clone)]
pub struct FileOperationLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileOperationLog {
    /// Create log writing to `path`; parent directories are created lazily
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_lock(path, Arc::default())
    }

    /// Create log whose appends serialize on a lock shared with other writers
    #[must_use]
    pub fn with_lock(path: impl Into<PathBuf>, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            path: path.into(),
            write_lock,
        }
    }

    /// Live log path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OperationLog for FileOperationLog {
    fn append(&self, record: &OpRecord) -> io::Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{record}")
    }
}

/// Operation log kept in memory
#[derive(Debug, Default)]
pub struct MemoryOperationLog {
    inner: Mutex<Vec<OpRecord>>,
}

impl MemoryOperationLog {
    /// Create empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records
    #[must_use]
    pub fn records(&self) -> Vec<OpRecord> {
        self.inner.lock().clone()
    }

    /// Rendered lines, as a file log would contain them
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().iter().map(ToString::to_string).collect()
    }

    /// Drop all records
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl OperationLog for MemoryOperationLog {
    fn append(&self, record: &OpRecord) -> io::Result<()> {
        self.inner.lock().push(record.clone());
        Ok(())
    }
}

/// Sink that discards records
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOperationLog;

impl OperationLog for NullOperationLog {
    fn append(&self, _record: &OpRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dry_run: bool) -> OpRecord {
        OpRecord::new(
            OpAction::CreateKey,
            Hive::ClassesRoot,
            r"*\shell\OpenVSCode",
            "all_files",
            "OpenVSCode",
            dry_run,
        )
    }

    #[test]
    fn simulated_and_real_lines_differ_only_in_tag() {
        let live = record(false);
        let mut simulated = record(true);
        simulated.timestamp = live.timestamp;

        let live_line = live.to_string();
        let simulated_line = simulated.to_string();
        assert!(live_line.contains("[APPLY] create_key"));
        assert_eq!(live_line.replace("[APPLY]", "[DRY-RUN]"), simulated_line);
        assert!(live_line.ends_with(r"path=HKCR\*\shell\OpenVSCode"));
    }

    #[test]
    fn detail_is_appended() {
        let line = record(false).with_detail("(Default)=Open").to_string();
        assert!(line.ends_with(" (Default)=Open"));
    }

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryOperationLog::new();
        log.append(&record(false)).unwrap();
        log.append(&record(true)).unwrap();
        let records = log.records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].dry_run);
        assert!(records[1].dry_run);
        log.clear();
        assert!(log.records().is_empty());
    }

    #[test]
    fn file_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("context_menu.log");
        let log = FileOperationLog::new(&path);

        log.append(&record(false)).unwrap();
        log.append(&record(true)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[DRY-RUN]"));
    }
}
