//! Windows registry backend (`winreg`)

use super::backend::{Hive, RegistryBackend};
use std::io;
use winreg::enums::{HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, KEY_READ, KEY_SET_VALUE};
use winreg::RegKey;

/// Backend over the live Windows registry
#[derive(Debug, Default, Clone, Copy)]
pub struct WinRegistry;

impl WinRegistry {
    /// Create backend
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn root(hive: Hive) -> RegKey {
        match hive {
            Hive::ClassesRoot => RegKey::predef(HKEY_CLASSES_ROOT),
            Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        }
    }

    fn open(hive: Hive, path: &str, flags: u32) -> io::Result<RegKey> {
        let root = Self::root(hive);
        if path.is_empty() {
            Ok(root)
        } else {
            root.open_subkey_with_flags(path, flags)
        }
    }
}

fn absent_as_none<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

impl RegistryBackend for WinRegistry {
    fn create_key(&self, hive: Hive, path: &str) -> io::Result<()> {
        Self::root(hive).create_subkey(path).map(|_| ())
    }

    fn set_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> io::Result<()> {
        let (key, _) = Self::root(hive).create_subkey(path)?;
        key.set_value(name, &value.to_string())
    }

    fn get_string(&self, hive: Hive, path: &str, name: &str) -> io::Result<Option<String>> {
        let Some(key) = absent_as_none(Self::open(hive, path, KEY_READ))? else {
            return Ok(None);
        };
        absent_as_none(key.get_value::<String, _>(name))
    }

    fn delete_value(&self, hive: Hive, path: &str, name: &str) -> io::Result<()> {
        let Some(key) = absent_as_none(Self::open(hive, path, KEY_SET_VALUE))? else {
            return Ok(());
        };
        absent_as_none(key.delete_value(name)).map(|_| ())
    }

    fn subkeys(&self, hive: Hive, path: &str) -> io::Result<Vec<String>> {
        match absent_as_none(Self::open(hive, path, KEY_READ))? {
            Some(key) => key.enum_keys().collect(),
            None => Ok(Vec::new()),
        }
    }

    fn key_exists(&self, hive: Hive, path: &str) -> io::Result<bool> {
        absent_as_none(Self::open(hive, path, KEY_READ)).map(|key| key.is_some())
    }

    fn delete_tree(&self, hive: Hive, path: &str) -> io::Result<()> {
        if path.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to delete a hive root",
            ));
        }
        Self::root(hive).delete_subkey_all(path)
    }
}
