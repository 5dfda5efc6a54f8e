//! Target scopes and their registry roots
//!
//! [`TargetScope`] names where an entry appears; [`ShellRoot`] is a concrete
//! registry location, carrying the extension for the extension scope.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Where a context-menu entry appears in Explorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetScope {
    /// Every file (`*\shell`)
    AllFiles,
    /// Folders (`Directory\shell`)
    Directory,
    /// Empty area of an open folder (`Directory\Background\shell`)
    DirBackground,
    /// Specific file extensions (`.ext\shell`)
    Extension,
}

impl TargetScope {
    /// All scopes in listing order
    pub const ALL: [TargetScope; 4] = [
        TargetScope::AllFiles,
        TargetScope::Directory,
        TargetScope::DirBackground,
        TargetScope::Extension,
    ];

    /// Stable wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllFiles => "all_files",
            Self::Directory => "directory",
            Self::DirBackground => "dir_background",
            Self::Extension => "extension",
        }
    }

    /// Human-readable label
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AllFiles => "All Files (*)",
            Self::Directory => "Directory",
            Self::DirBackground => r"Directory\Background",
            Self::Extension => "File Extension",
        }
    }

    /// Explorer verb placeholder substituted for `{target}` in commands
    ///
    /// Files receive the selected path as `%1`, folder scopes use `%V`.
    #[inline]
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::AllFiles | Self::Extension => "%1",
            Self::Directory | Self::DirBackground => "%V",
        }
    }
}

impl Display for TargetScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetScope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_files" | "all-files" | "*" => Ok(Self::AllFiles),
            "directory" | "dir" => Ok(Self::Directory),
            "dir_background" | "dir-background" | "background" => Ok(Self::DirBackground),
            "extension" | "ext" => Ok(Self::Extension),
            other => Err(ValidationError::UnknownScope(other.to_string())),
        }
    }
}

/// One concrete `...\shell` container under HKEY_CLASSES_ROOT
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShellRoot {
    /// `*\shell`
    AllFiles,
    /// `Directory\shell`
    Directory,
    /// `Directory\Background\shell`
    DirBackground,
    /// `<ext>\shell`; the extension is already normalized
    Extension(String),
}

impl ShellRoot {
    /// Fixed roots that exist independently of any extension
    pub const FIXED: [ShellRoot; 3] = [
        ShellRoot::AllFiles,
        ShellRoot::Directory,
        ShellRoot::DirBackground,
    ];

    /// Root for a non-extension scope
    ///
    /// Returns `None` for [`TargetScope::Extension`], which needs an extension.
    #[must_use]
    pub fn for_scope(scope: TargetScope) -> Option<Self> {
        match scope {
            TargetScope::AllFiles => Some(Self::AllFiles),
            TargetScope::Directory => Some(Self::Directory),
            TargetScope::DirBackground => Some(Self::DirBackground),
            TargetScope::Extension => None,
        }
    }

    /// Scope this root belongs to
    #[inline]
    #[must_use]
    pub fn scope(&self) -> TargetScope {
        match self {
            Self::AllFiles => TargetScope::AllFiles,
            Self::Directory => TargetScope::Directory,
            Self::DirBackground => TargetScope::DirBackground,
            Self::Extension(_) => TargetScope::Extension,
        }
    }

    /// Extension for extension roots
    #[inline]
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        match self {
            Self::Extension(ext) => Some(ext),
            _ => None,
        }
    }

    /// Registry path of the `shell` container, relative to HKCR
    #[must_use]
    pub fn shell_path(&self) -> String {
        match self {
            Self::AllFiles => r"*\shell".to_string(),
            Self::Directory => r"Directory\shell".to_string(),
            Self::DirBackground => r"Directory\Background\shell".to_string(),
            Self::Extension(ext) => format!(r"{ext}\shell"),
        }
    }

    /// Registry path of an entry's key under this root
    #[inline]
    #[must_use]
    pub fn key_path(&self, key_name: &str) -> String {
        format!(r"{}\{key_name}", self.shell_path())
    }

    /// Registry path of an entry's `command` subkey under this root
    #[inline]
    #[must_use]
    pub fn command_path(&self, key_name: &str) -> String {
        format!(r"{}\{key_name}\command", self.shell_path())
    }

    /// Label used in logs and failure reports
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Extension(ext) => format!("extension:{ext}"),
            other => other.scope().as_str().to_string(),
        }
    }
}

impl Display for ShellRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Normalize an extension to lowercase with a single leading dot
///
/// # Errors
/// `ValidationError::InvalidExtension` when the extension is empty or
/// contains path separators, wildcards or whitespace.
pub fn normalize_extension(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let bare = trimmed.trim_start_matches('.');
    if bare.is_empty()
        || bare
            .chars()
            .any(|c| matches!(c, '\\' | '/' | '*' | '?' | '.' | ':') || c.is_whitespace())
    {
        return Err(ValidationError::InvalidExtension(raw.to_string()));
    }
    Ok(format!(".{}", bare.to_lowercase()))
}
