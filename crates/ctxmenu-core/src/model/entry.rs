//! Menu entries
//!
//! A [`MenuEntry`] is one logical context-menu item that fans out to one or
//! more [`ShellRoot`]s. Construction and normalization are pure: nothing here
//! touches the registry or the filesystem.

use crate::error::ValidationError;
use crate::model::scope::{normalize_extension, ShellRoot, TargetScope};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Placeholder in a command replaced by the scope's Explorer verb argument
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// A logical context-menu item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Subkey name under each scope's `shell` key; immutable once created
    pub key_name: String,
    /// Label shown in Explorer; falls back to `key_name`
    #[serde(default)]
    pub display_name: Option<String>,
    /// Invocation written to the `command` subkey
    pub command: String,
    /// Icon source, optionally with a `,<index>` suffix
    #[serde(default)]
    pub icon: Option<String>,
    /// Scopes this entry is registered under
    #[serde(default)]
    pub scopes: BTreeSet<TargetScope>,
    /// Extensions for [`TargetScope::Extension`]
    #[serde(default)]
    pub extensions: BTreeSet<String>,
}

impl MenuEntry {
    /// Create entry with a command and no scopes yet
    #[must_use]
    pub fn new(key_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            display_name: None,
            command: command.into(),
            icon: None,
            scopes: BTreeSet::new(),
            extensions: BTreeSet::new(),
        }
    }

    /// Create entry launching `exe` with the scope's target argument
    #[must_use]
    pub fn for_executable(key_name: impl Into<String>, exe: &str) -> Self {
        Self::new(key_name, format!("\"{exe}\" \"{TARGET_PLACEHOLDER}\""))
    }

    /// With display name
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// With icon
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Add a scope
    #[must_use]
    pub fn with_scope(mut self, scope: TargetScope) -> Self {
        self.scopes.insert(scope);
        self
    }

    /// Add several scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = TargetScope>) -> Self {
        self.scopes.extend(scopes);
        self
    }

    /// Add an extension and the extension scope
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.scopes.insert(TargetScope::Extension);
        self.extensions.insert(extension.into());
        self
    }

    /// Label shown in Explorer
    #[inline]
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key_name)
    }

    /// Check the entry and normalize it in place
    ///
    /// Trims text fields, lowercases and dot-prefixes extensions, converts
    /// forward slashes in the executable token and icon to backslashes and
    /// drops extensions when the extension scope is not requested.
    ///
    /// # Errors
    /// - `ValidationError::EmptyKeyName` / `InvalidKeyName`
    /// - `ValidationError::EmptyCommand`
    /// - `ValidationError::NoScopes`
    /// - `ValidationError::MissingExtensions`
    /// - `ValidationError::InvalidExtension`
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.key_name = validate_key_name(&self.key_name)?;

        let command = self.command.trim();
        if command.is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        self.command = normalize_command(command);

        self.display_name = self
            .display_name
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.icon = self
            .icon
            .take()
            .map(|i| i.trim().replace('/', "\\"))
            .filter(|i| !i.is_empty());

        if self.scopes.is_empty() {
            return Err(ValidationError::NoScopes);
        }

        if self.scopes.contains(&TargetScope::Extension) {
            self.extensions = self
                .extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect::<Result<_, _>>()?;
            if self.extensions.is_empty() {
                return Err(ValidationError::MissingExtensions);
            }
        } else {
            self.extensions.clear();
        }

        Ok(())
    }

    /// Concrete registry roots this entry fans out to
    ///
    /// One root per non-extension scope plus one per extension.
    #[must_use]
    pub fn resolve_scope_paths(&self) -> Vec<ShellRoot> {
        let mut roots = Vec::with_capacity(self.scopes.len() + self.extensions.len());
        for scope in &self.scopes {
            match ShellRoot::for_scope(*scope) {
                Some(root) => roots.push(root),
                None => roots.extend(
                    self.extensions
                        .iter()
                        .map(|ext| ShellRoot::Extension(ext.clone())),
                ),
            }
        }
        roots
    }

    /// Command string written under `root`
    #[must_use]
    pub fn render_command(&self, root: &ShellRoot) -> String {
        self.command
            .replace(TARGET_PLACEHOLDER, root.scope().placeholder())
    }

    /// Command with concrete `%1` / `%V` arguments turned back into `{target}`
    ///
    /// Commands read back from the registry are already rendered for one
    /// scope; re-rendering the template keeps them correct for other scopes.
    #[must_use]
    pub fn command_template(&self) -> String {
        self.command
            .replace("\"%1\"", "\"{target}\"")
            .replace("\"%V\"", "\"{target}\"")
    }

    /// Record that this entry was found under `root`
    pub fn merge_root(&mut self, root: &ShellRoot) {
        self.scopes.insert(root.scope());
        if let Some(ext) = root.extension() {
            self.extensions.insert(ext.to_string());
        }
    }
}

/// Optional replacements applied by an edit; `key_name` cannot change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdate {
    /// New display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// New command
    #[serde(default)]
    pub command: Option<String>,
    /// New icon; `Some(None)` removes it
    #[serde(default, deserialize_with = "present_or_null")]
    pub icon: Option<Option<String>>,
    /// Replacement scope set
    #[serde(default)]
    pub scopes: Option<BTreeSet<TargetScope>>,
    /// Replacement extension set
    #[serde(default)]
    pub extensions: Option<BTreeSet<String>>,
}

impl EntryUpdate {
    /// Replace the scope set
    #[must_use]
    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = TargetScope>) -> Self {
        self.scopes = Some(scopes.into_iter().collect());
        self
    }

    /// Replace the extension set
    #[must_use]
    pub fn with_extensions<S: Into<String>>(mut self, exts: impl IntoIterator<Item = S>) -> Self {
        self.extensions = Some(exts.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the command
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Replace the display name
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Replace or clear the icon
    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Produce the edited entry; the result is not yet validated
    #[must_use]
    pub fn apply_to(&self, current: &MenuEntry) -> MenuEntry {
        let mut next = current.clone();
        if let Some(display_name) = &self.display_name {
            next.display_name = Some(display_name.clone());
        }
        if let Some(command) = &self.command {
            next.command.clone_from(command);
        }
        if let Some(icon) = &self.icon {
            next.icon.clone_from(icon);
        }
        if let Some(scopes) = &self.scopes {
            next.scopes.clone_from(scopes);
        }
        if let Some(extensions) = &self.extensions {
            next.extensions.clone_from(extensions);
        }
        next
    }
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Trim and check a key name
///
/// # Errors
/// `EmptyKeyName` for blank input, `InvalidKeyName` when the name would
/// create nested keys or contains control characters.
pub fn validate_key_name(raw: &str) -> Result<String, ValidationError> {
    let key_name = raw.trim();
    if key_name.is_empty() {
        return Err(ValidationError::EmptyKeyName);
    }
    if key_name.contains(['\\', '/']) {
        return Err(ValidationError::invalid_key_name(
            key_name,
            "must not contain path separators",
        ));
    }
    if key_name.chars().any(char::is_control) {
        return Err(ValidationError::invalid_key_name(
            key_name,
            "must not contain control characters",
        ));
    }
    if key_name.eq_ignore_ascii_case("command") {
        return Err(ValidationError::invalid_key_name(key_name, "reserved name"));
    }
    Ok(key_name.to_string())
}

/// Split a command into its executable token and the remaining arguments
///
/// A leading double-quoted token is taken verbatim without quotes;
/// otherwise the token runs to the first whitespace.
#[must_use]
pub fn split_command(command: &str) -> Option<(&str, &str)> {
    let command = command.trim_start();
    if let Some(rest) = command.strip_prefix('"') {
        let end = rest.find('"')?;
        Some((&rest[..end], &rest[end + 1..]))
    } else {
        let end = command.find(char::is_whitespace).unwrap_or(command.len());
        if end == 0 {
            return None;
        }
        Some((&command[..end], &command[end..]))
    }
}

fn normalize_command(command: &str) -> String {
    match split_command(command) {
        Some((exe, rest)) if exe.contains('/') => {
            let exe = exe.replace('/', "\\");
            if command.trim_start().starts_with('"') {
                format!("\"{exe}\"{rest}")
            } else {
                format!("{exe}{rest}")
            }
        }
        _ => command.to_string(),
    }
}
