//! Persisted settings.
//!
//! The only persisted state is the last address that connected
//! successfully, used to pre-fill the connect prompt next time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sync_core::ValidAddress;
use thiserror::Error;
use tokio::sync::Mutex;

/// File name used inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("settings I/O error at {path}: {source}")]
    Io {
        /// Settings file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("invalid settings file {path}: {source}")]
    Parse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Storage for the remembered peer address.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The last address that connected successfully.
    async fn last_address(&self) -> Result<Option<ValidAddress>, SettingsError>;

    /// Remember an address for future sessions.
    async fn set_last_address(&self, address: &ValidAddress) -> Result<(), SettingsError>;
}

/// On-disk settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_address: Option<ValidAddress>,
}

/// JSON settings file in the data directory.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Settings stored as [`SETTINGS_FILE`] inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SETTINGS_FILE),
        }
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SettingsFile, SettingsError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SettingsFile::default())
            }
            Err(e) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&contents).map_err(|e| SettingsError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    async fn save(&self, settings: &SettingsFile) -> Result<(), SettingsError> {
        let io_err = |e| SettingsError::Io {
            path: self.path.clone(),
            source: e,
        };
        let contents = serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&self.path, contents).await.map_err(io_err)?;
        set_file_permissions_0600(&self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn last_address(&self) -> Result<Option<ValidAddress>, SettingsError> {
        Ok(self.load().await?.last_address)
    }

    async fn set_last_address(&self, address: &ValidAddress) -> Result<(), SettingsError> {
        // A corrupt file is replaced rather than blocking persistence
        let mut settings = self.load().await.unwrap_or_default();
        settings.last_address = Some(address.clone());
        self.save(&settings).await
    }
}

/// In-memory settings (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemorySettings {
    last_address: Mutex<Option<ValidAddress>>,
}

impl MemorySettings {
    /// Empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with a remembered address.
    pub fn with_address(address: ValidAddress) -> Self {
        Self {
            last_address: Mutex::new(Some(address)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn last_address(&self) -> Result<Option<ValidAddress>, SettingsError> {
        Ok(self.last_address.lock().await.clone())
    }

    async fn set_last_address(&self, address: &ValidAddress) -> Result<(), SettingsError> {
        *self.last_address.lock().await = Some(address.clone());
        Ok(())
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
