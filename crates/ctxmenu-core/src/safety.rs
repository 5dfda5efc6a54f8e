//! Pre-flight safety checks
//!
//! Every registry mutation passes through [`SafetyValidator`] first:
//! input shape is checked before any I/O, and live writes are refused unless
//! the process is elevated.
//!
//! Path checks are lexical so they behave the same on every host; a path may
//! name a file that does not exist yet.

use crate::error::{RegistryError, ValidationError};
use crate::model::{split_command, MenuEntry};
use std::sync::Arc;

/// Characters Windows never accepts inside a path component
const FORBIDDEN_PATH_CHARS: [char; 6] = ['<', '>', '"', '|', '?', '*'];

/// Reports whether the process may write HKEY_CLASSES_ROOT
pub trait ElevationProbe: Send + Sync {
    /// `true` when the process token is elevated
    fn is_elevated(&self) -> bool;
}

/// Probe backed by the current process token
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessElevation;

impl ElevationProbe for ProcessElevation {
    fn is_elevated(&self) -> bool {
        process_token_elevated()
    }
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticElevation(pub bool);

impl ElevationProbe for StaticElevation {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn process_token_elevated() -> bool {
    use std::ffi::c_void;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    let mut token = HANDLE::default();
    // SAFETY: the current-process pseudo handle needs no cleanup and `token`
    // is closed before returning. `elevation` outlives the query.
    unsafe {
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }
        let mut elevation = TOKEN_ELEVATION::default();
        let mut returned = 0u32;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(std::ptr::addr_of_mut!(elevation).cast::<c_void>()),
            u32::try_from(std::mem::size_of::<TOKEN_ELEVATION>()).unwrap_or(u32::MAX),
            &mut returned,
        );
        let _ = CloseHandle(token);
        queried.is_ok() && elevation.TokenIsElevated != 0
    }
}

#[cfg(not(windows))]
fn process_token_elevated() -> bool {
    false
}

/// Gatekeeper for registry mutations
#[derive(Clone)]
pub struct SafetyValidator {
    probe: Arc<dyn ElevationProbe>,
}

impl std::fmt::Debug for SafetyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyValidator").finish_non_exhaustive()
    }
}

impl SafetyValidator {
    /// Create validator with a custom elevation probe
    #[must_use]
    pub fn new(probe: Arc<dyn ElevationProbe>) -> Self {
        Self { probe }
    }

    /// Validator probing the running process
    #[must_use]
    pub fn for_current_process() -> Self {
        Self::new(Arc::new(ProcessElevation))
    }

    /// Validator with a fixed elevation answer
    #[must_use]
    pub fn with_elevation(elevated: bool) -> Self {
        Self::new(Arc::new(StaticElevation(elevated)))
    }

    /// Whether the process may write HKEY_CLASSES_ROOT
    #[inline]
    #[must_use]
    pub fn check_elevation(&self) -> bool {
        self.probe.is_elevated()
    }

    /// Refuse a live mutation when not elevated
    ///
    /// Dry runs always pass since nothing is written.
    ///
    /// # Errors
    /// `RegistryError::PermissionDenied` when not elevated and `dry_run` is false.
    pub fn require_elevation(&self, operation: &str, dry_run: bool) -> Result<(), RegistryError> {
        if dry_run || self.check_elevation() {
            return Ok(());
        }
        tracing::error!(operation, "refusing registry write without elevation");
        Err(RegistryError::PermissionDenied(format!(
            "{operation} requires Administrator privileges; \
             re-run from an elevated terminal or use dry-run"
        )))
    }

    /// Check the command and icon of an already-normalized entry
    ///
    /// # Errors
    /// `InvalidExecutablePath` or `InvalidIconPath`.
    pub fn validate_entry(&self, entry: &MenuEntry) -> Result<(), ValidationError> {
        validate_command(&entry.command)?;
        validate_icon_path(entry.icon.as_deref())?;
        Ok(())
    }
}

/// Executable named by a command: the quoted or first bare token
#[must_use]
pub fn executable_token(command: &str) -> Option<&str> {
    split_command(command).map(|(exe, _)| exe)
}

/// Check the executable token at the start of a command
///
/// # Errors
/// `InvalidExecutablePath` when the command has no executable token or the
/// token is not an absolute path.
pub fn validate_command(command: &str) -> Result<(), ValidationError> {
    let exe = executable_token(command)
        .ok_or_else(|| ValidationError::invalid_executable(command, "no executable token"))?;
    validate_executable_path(exe)
}

/// Check that `path` is shaped like an absolute executable path
///
/// Accepts drive paths (`C:\...`), UNC paths (`\\server\share\...`) and paths
/// rooted at an environment variable (`%SystemRoot%\...`). The file does not
/// have to exist.
///
/// # Errors
/// `InvalidExecutablePath` describing the first problem found.
pub fn validate_executable_path(path: &str) -> Result<(), ValidationError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(ValidationError::invalid_executable(path, "empty path"));
    }
    if let Some(reason) = path_shape_problem(path) {
        return Err(ValidationError::invalid_executable(path, reason));
    }
    if !is_absolute_shape(path) {
        return Err(ValidationError::invalid_executable(
            path,
            "not an absolute path",
        ));
    }
    if !path.to_ascii_lowercase().ends_with(".exe") {
        tracing::warn!(path, "executable does not end with .exe");
    }
    Ok(())
}

/// Check an optional icon reference (`path` or `path,<index>`)
///
/// Bare file names with an extension (`shell32.dll,-3`) are accepted since
/// Explorer resolves them through the system path.
///
/// # Errors
/// `InvalidIconPath` when the path part is empty or malformed.
pub fn validate_icon_path(icon: Option<&str>) -> Result<(), ValidationError> {
    let Some(icon) = icon else {
        return Ok(());
    };
    let path = strip_icon_index(icon.trim()).trim();
    if path.is_empty() {
        return Err(ValidationError::invalid_icon(icon, "empty path"));
    }
    if let Some(reason) = path_shape_problem(path) {
        return Err(ValidationError::invalid_icon(icon, reason));
    }
    let has_extension = file_name(path).is_some_and(|name| {
        name.rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
    });
    if !is_absolute_shape(path) && !has_extension {
        return Err(ValidationError::invalid_icon(
            icon,
            "neither an absolute path nor a file name",
        ));
    }
    Ok(())
}

fn strip_icon_index(icon: &str) -> &str {
    match icon.rsplit_once(',') {
        Some((path, index)) if index.trim().parse::<i32>().is_ok() => path,
        _ => icon,
    }
}

fn file_name(path: &str) -> Option<&str> {
    path.rsplit(['\\', '/']).next().filter(|n| !n.is_empty())
}

fn path_shape_problem(path: &str) -> Option<&'static str> {
    if path.chars().any(|c| c.is_control() || FORBIDDEN_PATH_CHARS.contains(&c)) {
        return Some("contains characters not allowed in paths");
    }
    let after_drive = if has_drive_prefix(path) { &path[2..] } else { path };
    if after_drive.contains(':') {
        return Some("misplaced ':'");
    }
    if path.ends_with(['\\', '/']) {
        return Some("names a directory, not a file");
    }
    None
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn is_absolute_shape(path: &str) -> bool {
    let bytes = path.as_bytes();
    if has_drive_prefix(path) {
        return bytes.len() > 3 && matches!(bytes[2], b'\\' | b'/');
    }
    if let Some(rest) = path.strip_prefix(r"\\") {
        return rest
            .chars()
            .next()
            .is_some_and(|c| c != '\\' && c != '/');
    }
    if let Some(rest) = path.strip_prefix('%') {
        return match rest.split_once('%') {
            Some((var, tail)) => {
                !var.is_empty()
                    && var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == ')')
                    && (tail.is_empty() || tail.starts_with(['\\', '/']))
            }
            None => false,
        };
    }
    false
}
