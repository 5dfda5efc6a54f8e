//! Registry manager
//!
//! Translates [`MenuEntry`] operations into backend calls under
//! HKEY_CLASSES_ROOT and owns the Windows 11 classic-menu marker under
//! HKEY_CURRENT_USER. Every mutation, planned or executed, goes through the
//! [`OperationLog`] first.
//!
//! Order for all entry mutations: normalize and validate, then check
//! elevation (skipped for dry runs), then touch each root. A failing root
//! does not stop the others; failures come back together as
//! [`RegistryError::ScopeFailures`].

use super::backend::{Hive, RegistryBackend};
use super::shell::{ExplorerRestarter, ShellRestarter};
use crate::error::{RegistryError, ScopeFailure};
use crate::logging::{OpAction, OpRecord, OperationLog};
use crate::model::{validate_key_name, EntryUpdate, MenuEntry, ShellRoot};
use crate::safety::SafetyValidator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::sync::Arc;

/// CLSID key whose `InprocServer32` child restores the classic menu
pub const CLASSIC_MENU_CLSID_KEY: &str =
    r"Software\Classes\CLSID\{86ca1aa0-34aa-4e8b-a509-50c905bae2a2}";

/// Marker key; present with an empty default value means classic menu
pub const CLASSIC_MENU_MARKER_KEY: &str =
    r"Software\Classes\CLSID\{86ca1aa0-34aa-4e8b-a509-50c905bae2a2}\InprocServer32";

const CLASSIC_MENU_SCOPE: &str = "classic_menu";
const CLASSIC_MENU_ID: &str = "{86ca1aa0-34aa-4e8b-a509-50c905bae2a2}";
const ICON_VALUE: &str = "Icon";
const MUI_VERB_VALUE: &str = "MUIVerb";

/// Host state reported by [`RegistryManager::status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Process can write HKEY_CLASSES_ROOT
    pub elevated: bool,
    /// Windows 11 classic context menu is forced on
    pub classic_menu: bool,
}

/// Applies menu entries to the registry
pub struct RegistryManager {
    backend: Arc<dyn RegistryBackend>,
    safety: SafetyValidator,
    oplog: Arc<dyn OperationLog>,
    restarter: Arc<dyn ShellRestarter>,
}

impl fmt::Debug for RegistryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryManager")
            .field("safety", &self.safety)
            .finish_non_exhaustive()
    }
}

fn same_key(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn qualified(hive: Hive, path: &str) -> String {
    format!(r"{}\{path}", hive.abbrev())
}

fn scope_failure(root: &ShellRoot, path: &str, err: &io::Error) -> ScopeFailure {
    ScopeFailure {
        scope: root.label(),
        path: qualified(Hive::ClassesRoot, path),
        message: err.to_string(),
        permission_denied: err.kind() == io::ErrorKind::PermissionDenied,
    }
}

fn absent_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl RegistryManager {
    /// Create manager; Explorer restarts go through [`ExplorerRestarter`]
    #[must_use]
    pub fn new(
        backend: Arc<dyn RegistryBackend>,
        safety: SafetyValidator,
        oplog: Arc<dyn OperationLog>,
    ) -> Self {
        Self {
            backend,
            safety,
            oplog,
            restarter: Arc::new(ExplorerRestarter),
        }
    }

    /// With a different shell restarter
    #[must_use]
    pub fn with_shell_restarter(mut self, restarter: Arc<dyn ShellRestarter>) -> Self {
        self.restarter = restarter;
        self
    }

    /// Safety validator in use
    #[inline]
    #[must_use]
    pub fn safety(&self) -> &SafetyValidator {
        &self.safety
    }

    // ---- entry operations ----

    /// Register `entry` under every root it resolves to
    ///
    /// Existing keys with the same name are overwritten. Returns the
    /// normalized entry that was (or would have been) written.
    ///
    /// # Errors
    /// - `RegistryError::Validation` for malformed input
    /// - `RegistryError::PermissionDenied` when not elevated and not a dry run
    /// - `RegistryError::ScopeFailures` when some roots could not be written
    pub fn add_entry(&self, entry: &MenuEntry, dry_run: bool) -> Result<MenuEntry, RegistryError> {
        let mut entry = entry.clone();
        entry.validate()?;
        self.safety.validate_entry(&entry)?;
        self.safety.require_elevation("add_entry", dry_run)?;

        let failures = entry
            .resolve_scope_paths()
            .iter()
            .filter_map(|root| self.write_root(&entry, root, dry_run).err())
            .collect();
        self.finish(&entry.key_name, "added", failures, dry_run)?;
        Ok(entry)
    }

    /// Apply `update` to an existing entry
    ///
    /// Roots the entry no longer targets are removed; all requested roots are
    /// rewritten. When the command is not replaced, the stored command is
    /// re-rendered so new scopes get their own placeholder.
    ///
    /// # Errors
    /// `RegistryError::NotFound` when no root holds `key_name`, otherwise as
    /// [`add_entry`](Self::add_entry).
    pub fn edit_entry(
        &self,
        key_name: &str,
        update: &EntryUpdate,
        dry_run: bool,
    ) -> Result<MenuEntry, RegistryError> {
        let current = self
            .get_entry(key_name)?
            .ok_or_else(|| RegistryError::NotFound(key_name.trim().to_string()))?;

        let mut next = update.apply_to(&current);
        if update.command.is_none() {
            next.command = current.command_template();
        }
        next.validate()?;
        self.safety.validate_entry(&next)?;
        self.safety.require_elevation("edit_entry", dry_run)?;

        let old_roots = self.roots_containing(&current.key_name)?;
        let new_roots = next.resolve_scope_paths();

        let mut failures = Vec::new();
        for root in old_roots.iter().filter(|root| !new_roots.contains(*root)) {
            if let Err(failure) = self.delete_root(root, &current.key_name, dry_run) {
                failures.push(failure);
            }
        }
        for root in &new_roots {
            if let Err(failure) = self.write_root(&next, root, dry_run) {
                failures.push(failure);
            }
        }
        self.finish(&next.key_name, "updated", failures, dry_run)?;
        Ok(next)
    }

    /// Delete `key_name` from every root that holds it
    ///
    /// Idempotent: an absent entry removes nothing and succeeds. Returns the
    /// number of roots the entry was (or would have been) removed from.
    ///
    /// # Errors
    /// - `RegistryError::Validation` for a malformed key name
    /// - `RegistryError::PermissionDenied` when not elevated and not a dry run
    /// - `RegistryError::ScopeFailures` when some roots could not be cleared
    pub fn remove_entry(&self, key_name: &str, dry_run: bool) -> Result<usize, RegistryError> {
        let key_name = validate_key_name(key_name)?;
        self.safety.require_elevation("remove_entry", dry_run)?;

        let roots = self.roots_containing(&key_name)?;
        if roots.is_empty() {
            tracing::info!(key_name = %key_name, dry_run, "entry not registered; nothing to remove");
            return Ok(0);
        }

        let failures = roots
            .iter()
            .filter_map(|root| self.delete_root(root, &key_name, dry_run).err())
            .collect();
        self.finish(&key_name, "removed", failures, dry_run)?;
        Ok(roots.len())
    }

    /// All entries found under every scope root, ordered by key name
    ///
    /// Keys registered under several roots are merged into one entry. Roots
    /// and entries that cannot be read are skipped with a warning.
    ///
    /// # Errors
    /// `RegistryError::Backend` when HKEY_CLASSES_ROOT itself cannot be
    /// enumerated.
    pub fn list_entries(&self) -> Result<Vec<MenuEntry>, RegistryError> {
        let mut merged: BTreeMap<String, MenuEntry> = BTreeMap::new();
        for root in self.all_roots()? {
            let shell_path = root.shell_path();
            let names = match self.backend.subkeys(Hive::ClassesRoot, &shell_path) {
                Ok(names) => names,
                Err(err) => {
                    tracing::warn!(scope = %root.label(), path = %shell_path, error = %err, "skipping unreadable scope root");
                    continue;
                }
            };
            for name in names {
                let folded = name.to_lowercase();
                if let Some(existing) = merged.get_mut(&folded) {
                    existing.merge_root(&root);
                    continue;
                }
                match self.read_entry(&root, &name) {
                    Ok(entry) => {
                        merged.insert(folded, entry);
                    }
                    Err(err) => {
                        tracing::warn!(scope = %root.label(), key_name = %name, error = %err, "skipping unreadable entry");
                    }
                }
            }
        }
        tracing::debug!(count = merged.len(), "listed context menu entries");
        Ok(merged.into_values().collect())
    }

    /// Look up one entry by key name, case-insensitively
    ///
    /// Display name, icon and command come from the first readable root
    /// holding the key; scopes and extensions are merged over all of them.
    ///
    /// # Errors
    /// `RegistryError::Validation` for a malformed key name,
    /// `RegistryError::Backend` when no root holding the key can be read.
    pub fn get_entry(&self, key_name: &str) -> Result<Option<MenuEntry>, RegistryError> {
        let key_name = validate_key_name(key_name)?;
        let roots = self.roots_containing(&key_name)?;

        let mut entry = None;
        let mut last_error = None;
        for root in &roots {
            match self.read_stored(root, &key_name) {
                Ok(read) => {
                    entry = Some(read);
                    break;
                }
                Err(err) => {
                    tracing::warn!(scope = %root.label(), key_name = %key_name, error = %err, "entry unreadable under scope root");
                    last_error = Some(err);
                }
            }
        }
        let Some(mut entry) = entry else {
            return last_error.map_or(Ok(None), Err);
        };
        for root in &roots {
            entry.merge_root(root);
        }
        Ok(Some(entry))
    }

    // ---- Windows 11 classic menu ----

    /// Force the classic context menu on or off
    ///
    /// Writes only under HKEY_CURRENT_USER, so elevation is not required.
    /// Explorer is restarted last, and only when the write succeeded. Returns
    /// the marker state afterwards; a dry run returns the unchanged state.
    ///
    /// # Errors
    /// - `RegistryError::Backend` when the marker cannot be written or did
    ///   not change
    /// - `RegistryError::ShellRestart` when Explorer could not be restarted
    pub fn toggle_win11_classic_menu(
        &self,
        enable: bool,
        restart_explorer: bool,
        dry_run: bool,
    ) -> Result<bool, RegistryError> {
        let hive = Hive::CurrentUser;
        let marker_err = |e| RegistryError::backend(qualified(hive, CLASSIC_MENU_MARKER_KEY), e);
        let op = |action: OpAction, path: &str| {
            OpRecord::new(action, hive, path, CLASSIC_MENU_SCOPE, CLASSIC_MENU_ID, dry_run)
        };

        if enable {
            self.apply(
                op(OpAction::SetValue, CLASSIC_MENU_MARKER_KEY).with_detail("(Default)="),
                |b| b.set_string(hive, CLASSIC_MENU_MARKER_KEY, "", ""),
            )
            .map_err(marker_err)?;
        } else if self
            .backend
            .key_exists(hive, CLASSIC_MENU_MARKER_KEY)
            .map_err(marker_err)?
        {
            self.apply(op(OpAction::DeleteKey, CLASSIC_MENU_MARKER_KEY), |b| {
                absent_ok(b.delete_tree(hive, CLASSIC_MENU_MARKER_KEY))
            })
            .map_err(marker_err)?;
            self.remove_empty_clsid(dry_run);
        } else {
            self.record(
                &op(OpAction::Skip, CLASSIC_MENU_MARKER_KEY).with_detail("classic menu already off"),
            );
        }

        let state = self.get_classic_menu_state();
        if !dry_run && state != enable {
            return Err(marker_err(io::Error::other(
                "classic menu marker did not reach the requested state",
            )));
        }

        if restart_explorer {
            self.record(&op(OpAction::RestartShell, "").with_detail("explorer.exe"));
            if !dry_run {
                self.restarter.restart().map_err(RegistryError::ShellRestart)?;
            }
        }

        tracing::info!(enable, state, restart_explorer, dry_run, "classic menu toggled");
        Ok(state)
    }

    /// Whether the classic-menu marker is present with an empty default value
    ///
    /// Read failures are logged and reported as `false`.
    #[must_use]
    pub fn get_classic_menu_state(&self) -> bool {
        match self
            .backend
            .get_string(Hive::CurrentUser, CLASSIC_MENU_MARKER_KEY, "")
        {
            Ok(value) => value.is_some_and(|v| v.is_empty()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read classic menu marker");
                false
            }
        }
    }

    /// Elevation and classic-menu state
    #[must_use]
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            elevated: self.safety.check_elevation(),
            classic_menu: self.get_classic_menu_state(),
        }
    }

    // ---- internals ----

    fn record(&self, record: &OpRecord) {
        tracing::info!(
            action = record.action.as_str(),
            scope = %record.scope,
            key_name = %record.key_name,
            path = %record.full_path(),
            detail = record.detail.as_deref().unwrap_or(""),
            dry_run = record.dry_run,
            "registry operation"
        );
        if let Err(err) = self.oplog.append(record) {
            tracing::warn!(error = %err, "failed to append to operation log");
        }
    }

    /// Log `record` and run `op` unless it is a dry run
    fn apply(
        &self,
        record: OpRecord,
        op: impl FnOnce(&dyn RegistryBackend) -> io::Result<()>,
    ) -> io::Result<()> {
        if record.dry_run {
            self.record(&record);
            return Ok(());
        }
        match op(self.backend.as_ref()) {
            Ok(()) => {
                self.record(&record);
                Ok(())
            }
            Err(err) => {
                let detail = match &record.detail {
                    Some(detail) => format!("{detail} FAILED: {err}"),
                    None => format!("FAILED: {err}"),
                };
                self.record(&record.with_detail(detail));
                Err(err)
            }
        }
    }

    fn write_root(
        &self,
        entry: &MenuEntry,
        root: &ShellRoot,
        dry_run: bool,
    ) -> Result<(), ScopeFailure> {
        let hive = Hive::ClassesRoot;
        let scope = root.label();
        let key_path = root.key_path(&entry.key_name);
        let command_path = root.command_path(&entry.key_name);
        let op = |action: OpAction, path: &str| {
            OpRecord::new(action, hive, path, scope.as_str(), entry.key_name.as_str(), dry_run)
        };
        let on_key = |err: io::Error| scope_failure(root, &key_path, &err);
        let on_command = |err: io::Error| scope_failure(root, &command_path, &err);

        let label = entry.display_label();
        self.apply(op(OpAction::CreateKey, &key_path), |b| {
            b.create_key(hive, &key_path)
        })
        .map_err(on_key)?;
        self.apply(
            op(OpAction::SetValue, &key_path).with_detail(format!("(Default)={label}")),
            |b| b.set_string(hive, &key_path, "", label),
        )
        .map_err(on_key)?;

        match &entry.icon {
            Some(icon) => self
                .apply(
                    op(OpAction::SetValue, &key_path).with_detail(format!("{ICON_VALUE}={icon}")),
                    |b| b.set_string(hive, &key_path, ICON_VALUE, icon),
                )
                .map_err(on_key)?,
            None => {
                let stale = self
                    .backend
                    .get_string(hive, &key_path, ICON_VALUE)
                    .map_err(on_key)?;
                if stale.is_some() {
                    self.apply(
                        op(OpAction::DeleteValue, &key_path).with_detail(ICON_VALUE),
                        |b| b.delete_value(hive, &key_path, ICON_VALUE),
                    )
                    .map_err(on_key)?;
                }
            }
        }

        let command = entry.render_command(root);
        self.apply(op(OpAction::CreateKey, &command_path), |b| {
            b.create_key(hive, &command_path)
        })
        .map_err(on_command)?;
        self.apply(
            op(OpAction::SetValue, &command_path).with_detail(format!("(Default)={command}")),
            |b| b.set_string(hive, &command_path, "", &command),
        )
        .map_err(on_command)?;
        Ok(())
    }

    fn delete_root(
        &self,
        root: &ShellRoot,
        key_name: &str,
        dry_run: bool,
    ) -> Result<(), ScopeFailure> {
        let key_path = root.key_path(key_name);
        let record = OpRecord::new(
            OpAction::DeleteKey,
            Hive::ClassesRoot,
            key_path.as_str(),
            root.label(),
            key_name,
            dry_run,
        );
        self.apply(record, |b| absent_ok(b.delete_tree(Hive::ClassesRoot, &key_path)))
            .map_err(|err| scope_failure(root, &key_path, &err))
    }

    /// Drop the CLSID parent once nothing but the marker lives under it
    fn remove_empty_clsid(&self, dry_run: bool) {
        let hive = Hive::CurrentUser;
        let others = match self.backend.subkeys(hive, CLASSIC_MENU_CLSID_KEY) {
            Ok(names) => names
                .iter()
                .filter(|name| !name.eq_ignore_ascii_case("InprocServer32"))
                .count(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to inspect classic menu CLSID key");
                return;
            }
        };
        if others > 0 {
            return;
        }
        let record = OpRecord::new(
            OpAction::DeleteKey,
            hive,
            CLASSIC_MENU_CLSID_KEY,
            CLASSIC_MENU_SCOPE,
            CLASSIC_MENU_ID,
            dry_run,
        );
        if let Err(err) = self.apply(record, |b| absent_ok(b.delete_tree(hive, CLASSIC_MENU_CLSID_KEY))) {
            tracing::warn!(error = %err, "failed to remove classic menu CLSID key");
        }
    }

    fn read_entry(&self, root: &ShellRoot, name: &str) -> Result<MenuEntry, RegistryError> {
        let read = |path: &str, value: &str| {
            self.backend
                .get_string(Hive::ClassesRoot, path, value)
                .map_err(|e| RegistryError::backend(qualified(Hive::ClassesRoot, path), e))
        };

        let key_path = root.key_path(name);
        let label = match read(&key_path, "")?.filter(|l| !l.is_empty()) {
            Some(label) => Some(label),
            None => read(&key_path, MUI_VERB_VALUE)?,
        };
        let mut entry = MenuEntry {
            key_name: name.to_string(),
            display_name: label.filter(|l| !l.is_empty() && l != name),
            command: read(&root.command_path(name), "")?.unwrap_or_default(),
            icon: read(&key_path, ICON_VALUE)?.filter(|i| !i.is_empty()),
            scopes: BTreeSet::new(),
            extensions: BTreeSet::new(),
        };
        entry.merge_root(root);
        Ok(entry)
    }

    /// Read `key_name` under `root` using the case the registry stores
    fn read_stored(&self, root: &ShellRoot, key_name: &str) -> Result<MenuEntry, RegistryError> {
        let shell_path = root.shell_path();
        let stored_name = self
            .backend
            .subkeys(Hive::ClassesRoot, &shell_path)
            .map_err(|e| RegistryError::backend(qualified(Hive::ClassesRoot, &shell_path), e))?
            .into_iter()
            .find(|name| same_key(name, key_name))
            .unwrap_or_else(|| key_name.to_string());
        self.read_entry(root, &stored_name)
    }

    fn extension_roots(&self) -> Result<Vec<ShellRoot>, RegistryError> {
        let names = self
            .backend
            .subkeys(Hive::ClassesRoot, "")
            .map_err(|e| RegistryError::backend(Hive::ClassesRoot.abbrev(), e))?;
        Ok(names
            .into_iter()
            .filter(|name| name.len() > 1 && name.starts_with('.'))
            .map(|name| ShellRoot::Extension(name.to_lowercase()))
            .collect())
    }

    fn all_roots(&self) -> Result<Vec<ShellRoot>, RegistryError> {
        let mut roots = ShellRoot::FIXED.to_vec();
        roots.extend(self.extension_roots()?);
        Ok(roots)
    }

    /// Roots holding `key_name`; roots that cannot be probed are skipped
    fn roots_containing(&self, key_name: &str) -> Result<Vec<ShellRoot>, RegistryError> {
        let mut found = Vec::new();
        for root in self.all_roots()? {
            let path = root.key_path(key_name);
            match self.backend.key_exists(Hive::ClassesRoot, &path) {
                Ok(true) => found.push(root),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        scope = %root.label(),
                        path = %qualified(Hive::ClassesRoot, &path),
                        error = %err,
                        "skipping unreadable scope root"
                    );
                }
            }
        }
        Ok(found)
    }

    fn finish(
        &self,
        key_name: &str,
        outcome: &str,
        failures: Vec<ScopeFailure>,
        dry_run: bool,
    ) -> Result<(), RegistryError> {
        if failures.is_empty() {
            tracing::info!(key_name, dry_run, "entry {outcome}");
            return Ok(());
        }
        for failure in &failures {
            tracing::error!(
                key_name,
                scope = %failure.scope,
                path = %failure.path,
                error = %failure.message,
                "scope operation failed"
            );
        }
        Err(RegistryError::ScopeFailures {
            key_name: key_name.to_string(),
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryOperationLog;
    use crate::model::TargetScope;
    use crate::registry::memory::MemoryRegistry;
    use crate::registry::shell::MockShellRestarter;
    use pretty_assertions::assert_eq;

    const VSCODE: &str = r"C:\Program Files\Microsoft VS Code\Code.exe";

    struct Harness {
        registry: Arc<MemoryRegistry>,
        log: Arc<MemoryOperationLog>,
        manager: RegistryManager,
    }

    fn harness(elevated: bool) -> Harness {
        let registry = Arc::new(MemoryRegistry::new());
        let log = Arc::new(MemoryOperationLog::new());
        let manager = RegistryManager::new(
            registry.clone(),
            SafetyValidator::with_elevation(elevated),
            log.clone(),
        );
        Harness {
            registry,
            log,
            manager,
        }
    }

    fn vscode() -> MenuEntry {
        MenuEntry::for_executable("OpenVSCode", VSCODE)
            .with_display_name("Open with VS Code")
            .with_icon(format!("{VSCODE},0"))
            .with_scopes([TargetScope::AllFiles, TargetScope::Directory])
    }

    fn hkcr(h: &Harness, path: &str, value: &str) -> Option<String> {
        h.registry.get_string(Hive::ClassesRoot, path, value).unwrap()
    }

    #[test]
    fn add_writes_every_root() {
        let h = harness(true);
        h.manager.add_entry(&vscode(), false).unwrap();

        assert_eq!(
            hkcr(&h, r"*\shell\OpenVSCode", "").as_deref(),
            Some("Open with VS Code")
        );
        assert_eq!(
            hkcr(&h, r"*\shell\OpenVSCode\command", ""),
            Some(format!("\"{VSCODE}\" \"%1\""))
        );
        assert_eq!(
            hkcr(&h, r"Directory\shell\OpenVSCode\command", ""),
            Some(format!("\"{VSCODE}\" \"%V\""))
        );
        assert_eq!(
            hkcr(&h, r"Directory\shell\OpenVSCode", "Icon"),
            Some(format!("{VSCODE},0"))
        );
        assert!(!h
            .registry
            .key_exists(Hive::ClassesRoot, r"Directory\Background\shell\OpenVSCode")
            .unwrap());
        assert!(h.log.lines().iter().all(|l| l.contains("[APPLY]")));
    }

    #[test]
    fn add_then_get_returns_requested_scopes() {
        let h = harness(true);
        let entry = vscode().with_extension("TXT");
        h.manager.add_entry(&entry, false).unwrap();

        let found = h.manager.get_entry("openvscode").unwrap().unwrap();
        assert_eq!(found.key_name, "OpenVSCode");
        assert_eq!(found.display_name.as_deref(), Some("Open with VS Code"));
        assert_eq!(
            found.scopes,
            BTreeSet::from([
                TargetScope::AllFiles,
                TargetScope::Directory,
                TargetScope::Extension
            ])
        );
        assert_eq!(found.extensions, BTreeSet::from([".txt".to_string()]));
    }

    #[test]
    fn dry_run_writes_nothing_but_logs_plan() {
        let h = harness(false);
        h.manager.add_entry(&vscode(), true).unwrap();

        assert_eq!(h.registry.key_count(), 0);
        let lines = h.log.lines();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| l.contains("[DRY-RUN]")));
        assert!(lines
            .iter()
            .any(|l| l.contains(r"path=HKCR\Directory\shell\OpenVSCode\command")));
    }

    #[test]
    fn live_write_requires_elevation() {
        let h = harness(false);
        let err = h.manager.add_entry(&vscode(), false).unwrap_err();
        assert!(matches!(err, RegistryError::PermissionDenied(_)));
        assert!(err.is_permission());
        assert_eq!(h.registry.key_count(), 0);
        assert!(h.log.records().is_empty());
    }

    #[test]
    fn validation_runs_before_elevation_check() {
        let h = harness(false);
        let relative = MenuEntry::for_executable("Bad", r"tools\x.exe").with_scope(TargetScope::AllFiles);
        for dry_run in [true, false] {
            let err = h.manager.add_entry(&relative, dry_run).unwrap_err();
            assert!(matches!(err, RegistryError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn remove_is_idempotent() {
        let h = harness(true);
        h.manager.add_entry(&vscode().with_extension(".py"), false).unwrap();

        assert_eq!(h.manager.remove_entry("OpenVSCode", false).unwrap(), 3);
        assert_eq!(h.manager.get_entry("OpenVSCode").unwrap(), None);
        assert!(h.registry.key_exists(Hive::ClassesRoot, r".py\shell").unwrap());
        assert_eq!(h.manager.remove_entry("OpenVSCode", false).unwrap(), 0);
    }

    #[test]
    fn remove_dry_run_keeps_keys() {
        let h = harness(true);
        h.manager.add_entry(&vscode(), false).unwrap();
        let before = h.registry.key_count();

        assert_eq!(h.manager.remove_entry("OpenVSCode", true).unwrap(), 2);
        assert_eq!(h.registry.key_count(), before);
    }

    #[test]
    fn edit_moves_scopes_and_clears_icon() {
        let h = harness(true);
        h.manager.add_entry(&vscode(), false).unwrap();

        let update = EntryUpdate::default()
            .with_scopes([TargetScope::DirBackground])
            .with_icon(None);
        let edited = h.manager.edit_entry("OpenVSCode", &update, false).unwrap();
        assert_eq!(edited.scopes, BTreeSet::from([TargetScope::DirBackground]));

        assert!(!h
            .registry
            .key_exists(Hive::ClassesRoot, r"*\shell\OpenVSCode")
            .unwrap());
        assert!(!h
            .registry
            .key_exists(Hive::ClassesRoot, r"Directory\shell\OpenVSCode")
            .unwrap());
        assert_eq!(
            hkcr(&h, r"Directory\Background\shell\OpenVSCode\command", ""),
            Some(format!("\"{VSCODE}\" \"%V\""))
        );
        assert_eq!(hkcr(&h, r"Directory\Background\shell\OpenVSCode", "Icon"), None);
    }

    #[test]
    fn edit_missing_entry_is_not_found() {
        let h = harness(true);
        let err = h
            .manager
            .edit_entry("Ghost", &EntryUpdate::default().with_command("x"), false)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn partial_failure_reports_failed_roots_only() {
        let h = harness(true);
        h.registry
            .deny_writes_under(Hive::ClassesRoot, r"Directory\shell");

        let err = h.manager.add_entry(&vscode(), false).unwrap_err();
        let RegistryError::ScopeFailures { failures, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].scope, "directory");
        assert!(err.is_permission());
        assert!(h
            .registry
            .key_exists(Hive::ClassesRoot, r"*\shell\OpenVSCode\command")
            .unwrap());
        assert!(h.log.lines().iter().any(|l| l.contains("FAILED")));
    }

    #[test]
    fn list_merges_roots_in_key_order() {
        let h = harness(true);
        h.manager.add_entry(&vscode(), false).unwrap();
        let notepad = MenuEntry::for_executable("Edit", r"C:\Windows\notepad.exe")
            .with_extension(".txt")
            .with_extension(".log");
        h.manager.add_entry(&notepad, false).unwrap();

        let entries = h.manager.list_entries().unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key_name.as_str()).collect();
        assert_eq!(keys, vec!["Edit", "OpenVSCode"]);
        assert_eq!(
            entries[0].extensions,
            BTreeSet::from([".log".to_string(), ".txt".to_string()])
        );
        assert_eq!(entries[1].scopes.len(), 2);
    }

    #[test]
    fn classic_menu_toggle_round_trip() {
        let h = harness(false);
        assert!(!h.manager.get_classic_menu_state());

        assert!(h.manager.toggle_win11_classic_menu(true, false, false).unwrap());
        assert_eq!(
            h.registry
                .get_string(Hive::CurrentUser, CLASSIC_MENU_MARKER_KEY, "")
                .unwrap()
                .as_deref(),
            Some("")
        );

        assert!(!h.manager.toggle_win11_classic_menu(false, false, false).unwrap());
        assert!(!h
            .registry
            .key_exists(Hive::CurrentUser, CLASSIC_MENU_CLSID_KEY)
            .unwrap());
        // disabling twice is a logged no-op
        assert!(!h.manager.toggle_win11_classic_menu(false, false, false).unwrap());
        assert!(h.log.lines().last().unwrap().contains("skip"));
    }

    #[test]
    fn classic_menu_dry_run_reports_current_state() {
        let h = harness(false);
        let mut restarter = MockShellRestarter::new();
        restarter.expect_restart().times(0);
        let manager = RegistryManager::new(
            h.registry.clone(),
            SafetyValidator::with_elevation(false),
            h.log.clone(),
        )
        .with_shell_restarter(Arc::new(restarter));

        assert!(!manager.toggle_win11_classic_menu(true, true, true).unwrap());
        assert!(!manager.get_classic_menu_state());
        assert!(h
            .log
            .lines()
            .iter()
            .any(|l| l.contains("[DRY-RUN] restart_shell")));
    }

    #[test]
    fn restart_runs_after_successful_write() {
        let h = harness(false);
        let mut restarter = MockShellRestarter::new();
        restarter.expect_restart().times(1).returning(|| Ok(()));
        let manager = RegistryManager::new(
            h.registry.clone(),
            SafetyValidator::with_elevation(false),
            h.log.clone(),
        )
        .with_shell_restarter(Arc::new(restarter));

        assert!(manager.toggle_win11_classic_menu(true, true, false).unwrap());
    }

    #[test]
    fn failed_marker_write_skips_restart() {
        let h = harness(false);
        h.registry
            .deny_writes_under(Hive::CurrentUser, CLASSIC_MENU_CLSID_KEY);
        let mut restarter = MockShellRestarter::new();
        restarter.expect_restart().times(0);
        let manager = RegistryManager::new(
            h.registry.clone(),
            SafetyValidator::with_elevation(true),
            h.log.clone(),
        )
        .with_shell_restarter(Arc::new(restarter));

        let err = manager
            .toggle_win11_classic_menu(true, true, false)
            .unwrap_err();
        assert!(err.is_permission());
    }

    #[test]
    fn status_reports_elevation_and_marker() {
        let h = harness(true);
        h.manager.toggle_win11_classic_menu(true, false, false).unwrap();
        assert_eq!(
            h.manager.status(),
            SystemStatus {
                elevated: true,
                classic_menu: true
            }
        );
    }
}
