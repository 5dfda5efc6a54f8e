//! In-memory registry
//!
//! Case-insensitive key tree with the same semantics as the Windows
//! registry for the calls the engine makes. Used by tests and on hosts
//! without a registry. Writes or reads under selected prefixes can be
//! denied to exercise permission and partial-failure paths.

use super::backend::{join_path, Hive, RegistryBackend};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;

#[derive(Debug, Clone, Default)]
struct KeyNode {
    /// Original-case name of the last path segment
    name: String,
    /// Lowercased value name -> (original name, data)
    values: BTreeMap<String, (String, String)>,
}

#[derive(Debug, Default)]
struct Tree {
    /// (hive, lowercased full path) -> node; the hive root is implicit
    keys: BTreeMap<(Hive, String), KeyNode>,
    /// (hive, lowercased path prefix) where writes fail with access denied
    denied: Vec<(Hive, String)>,
    /// (hive, lowercased path prefix) where reads fail with access denied
    read_denied: Vec<(Hive, String)>,
}

/// Registry kept in process memory
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    tree: RwLock<Tree>,
}

fn fold(path: &str) -> String {
    path.trim_matches('\\').to_lowercase()
}

fn parent_of(folded: &str) -> &str {
    folded.rsplit_once('\\').map_or("", |(parent, _)| parent)
}

fn is_within(folded: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || folded == prefix
        || (folded.starts_with(prefix) && folded.as_bytes().get(prefix.len()) == Some(&b'\\'))
}

fn access_denied(hive: Hive, path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!(r"access denied: {}\{path}", hive.abbrev()),
    )
}

fn not_found(hive: Hive, path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!(r"key not found: {}\{path}", hive.abbrev()),
    )
}

fn check_prefixes(denied: &[(Hive, String)], hive: Hive, path: &str) -> io::Result<()> {
    let folded = fold(path);
    if denied
        .iter()
        .any(|(h, prefix)| *h == hive && is_within(&folded, prefix))
    {
        return Err(access_denied(hive, path));
    }
    Ok(())
}

impl Tree {
    fn check_writable(&self, hive: Hive, path: &str) -> io::Result<()> {
        check_prefixes(&self.denied, hive, path)
    }

    fn check_readable(&self, hive: Hive, path: &str) -> io::Result<()> {
        check_prefixes(&self.read_denied, hive, path)
    }

    fn exists(&self, hive: Hive, folded: &str) -> bool {
        folded.is_empty() || self.keys.contains_key(&(hive, folded.to_string()))
    }

    fn ensure(&mut self, hive: Hive, path: &str) -> &mut KeyNode {
        let trimmed = path.trim_matches('\\');
        let mut folded = String::new();
        for segment in trimmed.split('\\').filter(|s| !s.is_empty()) {
            folded = join_path(&folded, &segment.to_lowercase());
            self.keys
                .entry((hive, folded.clone()))
                .or_insert_with(|| KeyNode {
                    name: segment.to_string(),
                    values: BTreeMap::new(),
                });
        }
        self.keys.entry((hive, folded)).or_default()
    }
}

impl MemoryRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes at or below `prefix` fail with access denied
    pub fn deny_writes_under(&self, hive: Hive, prefix: &str) {
        self.tree.write().denied.push((hive, fold(prefix)));
    }

    /// Lift all write denials
    pub fn allow_all_writes(&self) {
        self.tree.write().denied.clear();
    }

    /// Make reads at or below `prefix` fail with access denied
    pub fn deny_reads_under(&self, hive: Hive, prefix: &str) {
        self.tree.write().read_denied.push((hive, fold(prefix)));
    }

    /// Number of keys stored, across hives
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.tree.read().keys.len()
    }
}

impl RegistryBackend for MemoryRegistry {
    fn create_key(&self, hive: Hive, path: &str) -> io::Result<()> {
        let mut tree = self.tree.write();
        tree.check_writable(hive, path)?;
        tree.ensure(hive, path);
        Ok(())
    }

    fn set_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> io::Result<()> {
        let mut tree = self.tree.write();
        tree.check_writable(hive, path)?;
        tree.ensure(hive, path)
            .values
            .insert(name.to_lowercase(), (name.to_string(), value.to_string()));
        Ok(())
    }

    fn get_string(&self, hive: Hive, path: &str, name: &str) -> io::Result<Option<String>> {
        let tree = self.tree.read();
        tree.check_readable(hive, path)?;
        Ok(tree
            .keys
            .get(&(hive, fold(path)))
            .and_then(|node| node.values.get(&name.to_lowercase()))
            .map(|(_, value)| value.clone()))
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> io::Result<()> {
        let mut tree = self.tree.write();
        tree.check_writable(hive, path)?;
        if let Some(node) = tree.keys.get_mut(&(hive, fold(path))) {
            node.values.remove(&name.to_lowercase());
        }
        Ok(())
    }

    fn subkeys(&self, hive: Hive, path: &str) -> io::Result<Vec<String>> {
        let tree = self.tree.read();
        tree.check_readable(hive, path)?;
        let folded = fold(path);
        if !tree.exists(hive, &folded) {
            return Ok(Vec::new());
        }
        Ok(tree
            .keys
            .iter()
            .filter(|((h, key), _)| *h == hive && !key.is_empty() && parent_of(key) == folded)
            .map(|(_, node)| node.name.clone())
            .collect())
    }

    fn key_exists(&self, hive: Hive, path: &str) -> io::Result<bool> {
        let tree = self.tree.read();
        tree.check_readable(hive, path)?;
        Ok(tree.exists(hive, &fold(path)))
    }

    fn delete_tree(&self, hive: Hive, path: &str) -> io::Result<()> {
        let mut tree = self.tree.write();
        let folded = fold(path);
        if folded.is_empty() || !tree.exists(hive, &folded) {
            return Err(not_found(hive, path));
        }
        tree.check_writable(hive, path)?;
        tree.keys
            .retain(|(h, key), _| *h != hive || !is_within(key, &folded));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_key_builds_ancestors() {
        let reg = MemoryRegistry::new();
        reg.create_key(Hive::ClassesRoot, r"Directory\Background\shell\Term")
            .unwrap();

        assert!(reg.key_exists(Hive::ClassesRoot, "directory").unwrap());
        assert_eq!(
            reg.subkeys(Hive::ClassesRoot, r"Directory\Background\shell")
                .unwrap(),
            vec!["Term".to_string()]
        );
        assert_eq!(reg.subkeys(Hive::ClassesRoot, "").unwrap(), vec!["Directory"]);
        assert!(!reg.key_exists(Hive::CurrentUser, "Directory").unwrap());
    }

    #[test]
    fn values_are_case_insensitive() {
        let reg = MemoryRegistry::new();
        reg.set_string(Hive::ClassesRoot, r"*\shell\A", "Icon", "a.ico")
            .unwrap();
        assert_eq!(
            reg.get_string(Hive::ClassesRoot, r"*\SHELL\a", "icon").unwrap(),
            Some("a.ico".to_string())
        );
        reg.delete_value(Hive::ClassesRoot, r"*\shell\A", "ICON").unwrap();
        assert_eq!(
            reg.get_string(Hive::ClassesRoot, r"*\shell\A", "Icon").unwrap(),
            None
        );
    }

    #[test]
    fn delete_tree_removes_descendants_only() {
        let reg = MemoryRegistry::new();
        reg.create_key(Hive::ClassesRoot, r"*\shell\A\command").unwrap();
        reg.create_key(Hive::ClassesRoot, r"*\shell\AB").unwrap();

        reg.delete_tree(Hive::ClassesRoot, r"*\shell\A").unwrap();

        assert!(!reg.key_exists(Hive::ClassesRoot, r"*\shell\A\command").unwrap());
        assert!(reg.key_exists(Hive::ClassesRoot, r"*\shell\AB").unwrap());
        let err = reg.delete_tree(Hive::ClassesRoot, r"*\shell\A").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn denied_prefix_blocks_writes() {
        let reg = MemoryRegistry::new();
        reg.create_key(Hive::ClassesRoot, r"Directory\shell\A").unwrap();
        reg.deny_writes_under(Hive::ClassesRoot, r"Directory\shell");

        let err = reg
            .create_key(Hive::ClassesRoot, r"Directory\shell\B")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(reg.delete_tree(Hive::ClassesRoot, r"Directory\shell\A").is_err());
        assert!(reg.create_key(Hive::ClassesRoot, r"*\shell\B").is_ok());
        assert!(reg
            .create_key(Hive::ClassesRoot, r"Directory\shellex\B")
            .is_ok());

        reg.allow_all_writes();
        assert!(reg.delete_tree(Hive::ClassesRoot, r"Directory\shell\A").is_ok());
    }

    #[test]
    fn denied_prefix_blocks_reads() {
        let reg = MemoryRegistry::new();
        reg.set_string(Hive::ClassesRoot, r".locked\shell\A", "", "A").unwrap();
        reg.create_key(Hive::ClassesRoot, r".txt\shell\B").unwrap();
        reg.deny_reads_under(Hive::ClassesRoot, ".locked");

        let err = reg.key_exists(Hive::ClassesRoot, r".locked\shell\A").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(reg.subkeys(Hive::ClassesRoot, r".locked\shell").is_err());
        assert!(reg.get_string(Hive::ClassesRoot, r".locked\shell\A", "").is_err());
        assert_eq!(reg.subkeys(Hive::ClassesRoot, "").unwrap().len(), 2);
        assert!(reg.key_exists(Hive::ClassesRoot, r".txt\shell\B").unwrap());
    }
}
