//! Registry access and the entry manager
//!
//! - [`RegistryBackend`]: raw key/value surface ([`MemoryRegistry`], `WinRegistry`)
//! - [`RegistryManager`]: add/edit/remove/list of menu entries and the
//!   Windows 11 classic-menu marker
//! - [`ShellRestarter`]: optional Explorer restart after a menu-style change

pub mod backend;
pub mod manager;
pub mod memory;
pub mod shell;
#[cfg(windows)]
pub mod windows;

pub use backend::{join_path, Hive, RegistryBackend};
pub use manager::{
    RegistryManager, SystemStatus, CLASSIC_MENU_CLSID_KEY, CLASSIC_MENU_MARKER_KEY,
};
pub use memory::MemoryRegistry;
pub use shell::{ExplorerRestarter, ShellRestarter};
#[cfg(windows)]
pub use windows::WinRegistry;

use std::sync::Arc;

/// Backend for the current host
///
/// The live registry on Windows; an empty [`MemoryRegistry`] elsewhere so
/// dry runs and the HTTP surface still work.
#[must_use]
pub fn default_backend() -> Arc<dyn RegistryBackend> {
    #[cfg(windows)]
    {
        Arc::new(WinRegistry::new())
    }
    #[cfg(not(windows))]
    {
        tracing::warn!("no Windows registry on this host; using an in-memory registry");
        Arc::new(MemoryRegistry::new())
    }
}
