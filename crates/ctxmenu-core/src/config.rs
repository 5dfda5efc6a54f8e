//! Paths and configuration
//!
//! [`AppPaths`] tells the operation log and the backup store where to live.
//! [`AppConfig`] is the optional `ctxmenu.toml` shared by the CLI and server.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "ctxmenu.toml";

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV: &str = "CTXMENU_LOG_DIR";

/// File name of the live operation log
pub const LOG_FILE_NAME: &str = "context_menu.log";

/// Directory name for log backups, relative to the log directory
pub const BACKUP_DIR_NAME: &str = "backups";

/// Location of the live operation log and its backups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPaths {
    /// Live log file
    pub log_file: PathBuf,
    /// Directory holding `*.bak` snapshots
    pub backup_dir: PathBuf,
}

impl AppPaths {
    /// `context_menu.log` and `backups/` inside `dir`
    #[must_use]
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            log_file: dir.join(LOG_FILE_NAME),
            backup_dir: dir.join(BACKUP_DIR_NAME),
        }
    }

    /// `<temp>/ContextMenuCreator/logs`
    #[must_use]
    pub fn default_location() -> Self {
        Self::under(std::env::temp_dir().join("ContextMenuCreator").join("logs"))
    }

    /// Directory containing the live log
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        self.log_file.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::default_location()
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// TCP port
    pub port: u16,
}

impl ServerConfig {
    /// `bind:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log directory; [`AppPaths::default_location`] when unset
    pub log_dir: Option<PathBuf>,
    /// HTTP listener
    pub server: ServerConfig,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            server: ServerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration
    ///
    /// Reads `explicit` when given, else `ctxmenu.toml` in the working
    /// directory if present, else defaults. `CTXMENU_LOG_DIR` overrides the
    /// log directory in every case.
    ///
    /// # Errors
    /// `ConfigError` when the chosen file cannot be read or parsed. A missing
    /// implicit file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let implicit = Path::new(CONFIG_FILE_NAME);
                if implicit.is_file() {
                    Self::from_file(implicit)?
                } else {
                    Self::default()
                }
            }
        };
        if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|d| !d.is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` or `ConfigError::Parse`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// With log directory
    #[inline]
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// With server port
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// With server bind address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.server.bind = bind.into();
        self
    }

    /// With log level filter
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Resolved log and backup locations
    #[must_use]
    pub fn paths(&self) -> AppPaths {
        match &self.log_dir {
            Some(dir) => AppPaths::under(dir),
            None => AppPaths::default_location(),
        }
    }
}
