//! Testing utilities for the ctxmenu workspace
//!
//! Shared fixtures: an in-memory manager harness, sample entries and
//! throwaway log directories.

#![allow(missing_docs)]

use ctxmenu_core::{
    AppPaths, LogStore, MemoryOperationLog, MemoryRegistry, MenuEntry, RegistryManager,
    SafetyValidator, TargetScope,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const VSCODE_EXE: &str = r"C:\VSCode\Code.exe";
pub const NOTEPAD_EXE: &str = r"C:\Windows\System32\notepad.exe";

/// Manager over an in-memory registry and log
pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub log: Arc<MemoryOperationLog>,
    pub manager: RegistryManager,
}

impl Harness {
    /// Harness whose process reports `elevated`
    pub fn new(elevated: bool) -> Self {
        let registry = Arc::new(MemoryRegistry::new());
        let log = Arc::new(MemoryOperationLog::new());
        let manager = RegistryManager::new(
            registry.clone(),
            SafetyValidator::with_elevation(elevated),
            log.clone(),
        );
        Self {
            registry,
            log,
            manager,
        }
    }

    /// Elevated harness
    pub fn elevated() -> Self {
        Self::new(true)
    }

    /// Harness without elevation
    pub fn unelevated() -> Self {
        Self::new(false)
    }
}

/// Log store in a fresh temp directory; keep the `TempDir` alive
pub fn temp_log_store() -> (TempDir, LogStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = LogStore::new(AppPaths::under(dir.path().join("logs")));
    (dir, store)
}

/// `OpenVSCode` on all files, launching `"C:\VSCode\Code.exe" "%1"`
pub fn vscode_entry() -> MenuEntry {
    MenuEntry::new("OpenVSCode", format!("\"{VSCODE_EXE}\" \"%1\""))
        .with_scope(TargetScope::AllFiles)
}

/// Notepad on `.txt` and `.log` files, with an icon
pub fn notepad_entry() -> MenuEntry {
    MenuEntry::for_executable("EditWithNotepad", NOTEPAD_EXE)
        .with_display_name("Edit with Notepad")
        .with_icon(format!("{NOTEPAD_EXE},0"))
        .with_extension(".txt")
        .with_extension(".log")
}

/// Terminal on folders and folder backgrounds
pub fn terminal_entry() -> MenuEntry {
    MenuEntry::for_executable("OpenTerminal", r"%LOCALAPPDATA%\Microsoft\WindowsApps\wt.exe")
        .with_display_name("Open Terminal here")
        .with_scopes([TargetScope::Directory, TargetScope::DirBackground])
}
