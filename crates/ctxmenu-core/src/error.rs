//! Error types for the context-menu engine
//!
//! Provides one error enum per component:
//! - [`ValidationError`] for malformed input, raised before any I/O
//! - [`RegistryError`] for registry mutations and lookups
//! - [`BackupError`] for the operation-log backup store
//!
//! [`CtxMenuError`] unifies them for front ends that handle every component.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Input rejected before any registry or filesystem access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `key_name` is empty or whitespace
    #[error("key name must not be empty")]
    EmptyKeyName,

    /// `key_name` cannot be used as a single registry subkey
    #[error("invalid key name '{key_name}': {reason}")]
    InvalidKeyName {
        /// Rejected name as given
        key_name: String,
        /// What makes it unusable
        reason: String,
    },

    /// `command` is empty or whitespace
    #[error("command must not be empty")]
    EmptyCommand,

    /// No target scope requested
    #[error("at least one target scope is required")]
    NoScopes,

    /// Extension scope requested without extensions
    #[error("extension scope requires at least one extension")]
    MissingExtensions,

    /// Extension string cannot be normalized
    #[error("invalid extension: '{0}'")]
    InvalidExtension(String),

    /// Unknown scope name from an external payload
    #[error("unknown scope: '{0}'")]
    UnknownScope(String),

    /// Executable token of a command is missing or malformed
    #[error("invalid executable path '{path}': {reason}")]
    InvalidExecutablePath {
        /// Executable token, or the whole command when none was found
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Icon path is malformed
    #[error("invalid icon path '{path}': {reason}")]
    InvalidIconPath {
        /// Icon path as given
        path: String,
        /// What is wrong with it
        reason: String,
    },
}

impl ValidationError {
    /// Create invalid key name error
    pub fn invalid_key_name(key_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeyName {
            key_name: key_name.into(),
            reason: reason.into(),
        }
    }

    /// Create invalid executable path error
    pub fn invalid_executable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExecutablePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create invalid icon path error
    pub fn invalid_icon(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIconPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// One failed root inside a multi-scope operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFailure {
    /// Scope label (`all_files`, `extension:.txt`, ...)
    pub scope: String,
    /// Full registry path of the failed key
    pub path: String,
    /// Underlying error message
    pub message: String,
    /// Whether the failure was an access denial
    pub permission_denied: bool,
}

impl fmt::Display for ScopeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.scope, self.path, self.message)
    }
}

/// Errors raised by the registry manager
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Process lacks the privilege needed to write HKEY_CLASSES_ROOT
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Input validation failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No entry registered under this key name
    #[error("entry not found: {0}")]
    NotFound(String),

    /// A single registry call failed
    #[error("registry operation failed on {path}: {source}")]
    Backend {
        /// Full registry path, hive included
        path: String,
        /// Error from the backend
        #[source]
        source: io::Error,
    },

    /// Some roots of a multi-scope operation failed; the others were applied
    #[error("{} scope operation(s) failed for '{key_name}': {}", .failures.len(), join_failures(.failures))]
    ScopeFailures {
        /// Entry being mutated
        key_name: String,
        /// Roots that failed, in processing order
        failures: Vec<ScopeFailure>,
    },

    /// Explorer could not be restarted after the registry change
    #[error("failed to restart explorer: {0}")]
    ShellRestart(#[source] io::Error),
}

fn join_failures(failures: &[ScopeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RegistryError {
    /// Create backend error for a registry path
    pub fn backend(path: impl Into<String>, source: io::Error) -> Self {
        Self::Backend {
            path: path.into(),
            source,
        }
    }

    /// Check if the error stems from missing privileges
    #[must_use]
    pub fn is_permission(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::Backend { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
            Self::ScopeFailures { failures, .. } => {
                !failures.is_empty() && failures.iter().all(|f| f.permission_denied)
            }
            _ => false,
        }
    }

    /// Check if the error is a lookup miss
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the caller can fix the input and retry
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::PermissionDenied(_))
    }
}

/// Errors raised by the log backup store
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Backup name is malformed or escapes the backup directory
    #[error("invalid backup name '{name}': {reason}")]
    InvalidName {
        /// Name as requested
        name: String,
        /// Why it was refused
        reason: String,
    },

    /// No such backup in the backup directory
    #[error("backup not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl BackupError {
    /// Create invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the error is a lookup miss
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for [`crate::config::AppConfig`]
    #[error("invalid config {path}: {message}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

/// Combined error for callers spanning several components
#[derive(Debug, thiserror::Error)]
pub enum CtxMenuError {
    /// Entry rejected before any registry access
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registry read, write or privilege failure
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Operation-log backup store failure
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CtxMenuError {
    /// Check if the error stems from missing privileges
    #[must_use]
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_permission())
    }

    /// Check if the error is a lookup miss
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Registry(e) => e.is_not_found(),
            Self::Backup(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if the error is a rejected input
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Registry(RegistryError::Validation(_))
                | Self::Backup(BackupError::InvalidName { .. })
        )
    }
}

/// Result type alias for engine operations
pub type CtxMenuResult<T> = Result<T, CtxMenuError>;
