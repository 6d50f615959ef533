//! On-disk layout for avatar content.
//!
//! Local assets (this participant's own avatar) live directly in the data
//! directory; assets received from peers are persisted under `shared/`,
//! written once per successful finalization:
//!
//!   <data_dir>/<name>.vrm
//!   <data_dir>/settings_<name>.txt
//!   <data_dir>/shared/<name>.vrm
//!   <data_dir>/shared/settings_<name>.txt

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn local_asset_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.vrm"))
    }

    pub fn local_settings_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("settings_{name}.txt"))
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join("shared")
    }

    pub fn shared_asset_path(&self, name: &str) -> PathBuf {
        self.shared_dir().join(format!("{name}.vrm"))
    }

    pub fn shared_settings_path(&self, name: &str) -> PathBuf {
        self.shared_dir().join(format!("settings_{name}.txt"))
    }

    /// Read this participant's own asset bytes, if present.
    pub fn load_local_asset(&self, name: &str) -> Option<Bytes> {
        let path = self.local_asset_path(name);
        match std::fs::read(&path) {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read local asset");
                None
            }
        }
    }

    /// Read this participant's own settings text, if present.
    pub fn load_local_settings(&self, name: &str) -> Option<String> {
        let path = self.local_settings_path(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read local settings");
                None
            }
        }
    }

    /// Persist a received asset. Returns the written path.
    pub fn save_shared_asset(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.shared_asset_path(name);
        write_file(&path, bytes)?;
        tracing::info!(name, bytes = bytes.len(), path = %path.display(), "asset persisted");
        Ok(path)
    }

    /// Persist received settings text. Returns the written path.
    pub fn save_shared_settings(&self, name: &str, text: &str) -> Result<PathBuf> {
        let path = self.shared_settings_path(name);
        write_file(&path, text.as_bytes())?;
        Ok(path)
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}
