//! Configuration system for Mantle.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MANTLE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/mantle/config.toml
//!   3. ~/.config/mantle/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MantleConfig {
    pub sharing: SharingConfig,
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Accept assets announced by other participants. Ignored on the
    /// authoritative host, which must relay regardless.
    pub accept_remote: bool,
    /// Delay before the initial announce / query-all after joining.
    /// Staggers traffic during a mass join.
    pub share_delay_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Max payload bytes per data packet.
    pub max_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for avatar content. Local assets live directly in it
    /// (`<name>.vrm`, `settings_<name>.txt`); received assets are written
    /// to its `shared/` subdirectory.
    pub data_dir: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MantleConfig {
    fn default() -> Self {
        Self {
            sharing: SharingConfig::default(),
            transfer: TransferConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            accept_remote: true,
            share_delay_secs: 10.0,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: crate::wire::DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("mantle")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("mantle")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MantleConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MantleConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MANTLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MantleConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply MANTLE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MANTLE_SHARING__ACCEPT_REMOTE") {
            self.sharing.accept_remote = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("MANTLE_SHARING__SHARE_DELAY_SECS") {
            if let Ok(d) = v.parse() {
                self.sharing.share_delay_secs = d;
            }
        }
        if let Ok(v) = std::env::var("MANTLE_TRANSFER__MAX_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.max_chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("MANTLE_STORAGE__DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
    }
}
