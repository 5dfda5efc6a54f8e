//! Entry model: menu entries, scopes and their registry roots

pub mod entry;
pub mod scope;

pub use entry::{split_command, validate_key_name, EntryUpdate, MenuEntry, TARGET_PLACEHOLDER};
pub use scope::{normalize_extension, ShellRoot, TargetScope};
