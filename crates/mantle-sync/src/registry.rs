//! Asset registry — the single owner of "the current asset for name X".
//!
//! Shared between the protocol task (which installs received assets) and
//! the host (which reads entries when players spawn). The host clears it
//! at defined lifecycle points via `reset` rather than by ad hoc global
//! mutation.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use mantle_core::settings::SettingsStore;
use mantle_core::Digest;

use crate::visual::{VisualBackend, VisualHandle};

/// Where an asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// Loaded from this participant's own storage.
    Local,
    /// Installed via the sync protocol from a peer.
    Received,
}

/// One participant's avatar asset.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    /// Raw content. Evicted after hashing on hosts that will never
    /// re-serve the bytes.
    pub content: Option<Bytes>,
    pub content_hash: Digest,
    pub settings_hash: Digest,
    pub source: AssetSource,
    pub visual: VisualHandle,
}

/// Mapping from participant name to their current asset.
///
/// At most one entry per name. Replacing an entry releases the superseded
/// visual unless both entries share the same handle.
#[derive(Clone)]
pub struct AssetRegistry {
    inner: Arc<DashMap<String, Asset>>,
    backend: Arc<dyn VisualBackend>,
}

impl AssetRegistry {
    pub fn new(backend: Arc<dyn VisualBackend>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            backend,
        }
    }

    pub fn get(&self, name: &str) -> Option<Asset> {
        self.inner.get(name).map(|e| e.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Names of all registered assets.
    pub fn names(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }

    /// Register `asset` under its name and apply presentation defaults.
    ///
    /// Returns the stored asset, or `None` (logged, registry untouched) if
    /// the visual handle is already registered under a different name.
    /// Re-registering an identical asset is idempotent. Never panics.
    pub fn register(&self, asset: Asset, settings: &SettingsStore) -> Option<Asset> {
        // Aliasing guard: one visual, one name.
        for entry in self.inner.iter() {
            if entry.key() != &asset.name && entry.value().visual == asset.visual {
                tracing::error!(
                    name = asset.name,
                    existing = %entry.key(),
                    "attempt to register a visual that is already registered"
                );
                return None;
            }
        }

        if let Some(existing) = self.inner.get(&asset.name) {
            if existing.visual != asset.visual {
                self.backend.release(existing.visual);
            }
        }

        self.backend
            .apply_presentation(asset.visual, &settings.get_or_default(&asset.name));

        self.inner.insert(asset.name.clone(), asset.clone());
        Some(asset)
    }

    /// Remove the entry for `name` and release its visual.
    pub fn remove(&self, name: &str) {
        if let Some((_, asset)) = self.inner.remove(name) {
            self.backend.release(asset.visual);
        }
    }

    /// Drop the retained content bytes for `name`, keeping the hashes.
    pub fn evict_content(&self, name: &str) {
        if let Some(mut entry) = self.inner.get_mut(name) {
            entry.content = None;
        }
    }

    /// Update the stored settings digest for `name`.
    pub fn set_settings_hash(&self, name: &str, digest: Digest) {
        if let Some(mut entry) = self.inner.get_mut(name) {
            entry.settings_hash = digest;
        }
    }

    /// Release every visual and clear the registry. Invoked by the host on
    /// session restart.
    pub fn reset(&self) {
        let names = self.names();
        for name in names {
            self.remove(&name);
        }
    }
}
