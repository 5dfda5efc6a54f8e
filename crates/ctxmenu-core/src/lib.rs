//! ctxmenu-core - Explorer context-menu registry engine
//!
//! Turns scope-agnostic menu entries into registry keys under
//! HKEY_CLASSES_ROOT:
//! - [`model`]: entries, target scopes and their registry roots
//! - [`safety`]: elevation and path checks run before any write
//! - [`registry`]: the [`RegistryManager`], the only component holding a
//!   registry handle, plus the Windows 11 classic-menu toggle
//! - [`backup`]: clear/restore/delete of operation-log snapshots
//!
//! # Example
//!
//! ```rust,ignore
//! use ctxmenu_core::prelude::*;
//! use std::sync::Arc;
//!
//! let paths = AppPaths::default_location();
//! let store = LogStore::new(paths);
//! let manager = RegistryManager::new(
//!     default_backend(),
//!     SafetyValidator::for_current_process(),
//!     Arc::new(store.operation_log()),
//! );
//!
//! let entry = MenuEntry::for_executable("OpenVSCode", r"C:\VSCode\Code.exe")
//!     .with_scopes([TargetScope::AllFiles, TargetScope::Directory]);
//! manager.add_entry(&entry, true)?; // dry run: logged, nothing written
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod safety;

pub use backup::{BackupMetadata, LogStore, LogTail, DEFAULT_TAIL_LINES};
pub use config::{AppConfig, AppPaths, ServerConfig};
pub use error::{
    BackupError, ConfigError, CtxMenuError, CtxMenuResult, RegistryError, ScopeFailure,
    ValidationError,
};
pub use logging::{
    FileOperationLog, MemoryOperationLog, NullOperationLog, OpAction, OpRecord, OperationLog,
};
pub use model::{EntryUpdate, MenuEntry, ShellRoot, TargetScope};
pub use registry::{
    default_backend, Hive, MemoryRegistry, RegistryBackend, RegistryManager, SystemStatus,
};
pub use safety::{ElevationProbe, ProcessElevation, SafetyValidator, StaticElevation};

/// Common imports
pub mod prelude {
    pub use crate::{
        default_backend, AppConfig, AppPaths, CtxMenuError, CtxMenuResult, EntryUpdate, LogStore,
        MenuEntry, OperationLog, RegistryError, RegistryManager, SafetyValidator, TargetScope,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
