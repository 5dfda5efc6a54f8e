//! Registry backend boundary
//!
//! [`RegistryBackend`] is the raw key/value surface the manager drives. Paths
//! are backslash-separated and relative to a [`Hive`]; the empty path is the
//! hive itself. A missing key surfaces as `io::ErrorKind::NotFound`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Registry hives used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hive {
    /// HKEY_CLASSES_ROOT
    ClassesRoot,
    /// HKEY_CURRENT_USER
    CurrentUser,
}

impl Hive {
    /// Short form used in logs
    #[inline]
    #[must_use]
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKCR",
            Self::CurrentUser => "HKCU",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// Raw registry access
///
/// Implementations must not cache: every call observes live state.
pub trait RegistryBackend: Send + Sync {
    /// Create `path` and any missing ancestors; existing keys are kept
    fn create_key(&self, hive: Hive, path: &str) -> io::Result<()>;

    /// Set a string value, creating the key if needed; `""` is the default value
    fn set_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> io::Result<()>;

    /// Read a string value; `Ok(None)` when the key or value is absent
    fn get_string(&self, hive: Hive, path: &str, name: &str) -> io::Result<Option<String>>;

    /// Remove a value; absent values are not an error
    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> io::Result<()>;

    /// Names of the direct subkeys; empty when the key is absent
    fn subkeys(&self, hive: Hive, path: &str) -> io::Result<Vec<String>>;

    /// Whether `path` exists
    fn key_exists(&self, hive: Hive, path: &str) -> io::Result<bool>;

    /// Delete `path` with all descendants; `NotFound` when absent
    fn delete_tree(&self, hive: Hive, path: &str) -> io::Result<()>;
}

/// Join a parent path and a child name
#[must_use]
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!(r"{parent}\{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_hive_root() {
        assert_eq!(join_path("", ".txt"), ".txt");
        assert_eq!(join_path(r".txt\shell", "Edit"), r".txt\shell\Edit");
    }

    #[test]
    fn hive_abbreviations() {
        assert_eq!(Hive::ClassesRoot.to_string(), "HKCR");
        assert_eq!(Hive::CurrentUser.abbrev(), "HKCU");
    }
}
