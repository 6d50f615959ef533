//! Finalization — turning a completed transfer into an installed asset.
//!
//! Runs at most once per completed tracker. Digests are always recomputed
//! from the content actually assembled or parsed here; the peer-announced
//! values only ever influenced the decision to request.

use mantle_core::{Digest, PeerId, SyncMessage};

use crate::controller::SyncController;
use crate::registry::{Asset, AssetSource};
use crate::send::Outbound;
use crate::tracker::TransferTracker;

impl SyncController {
    /// Decode, install, and register a fully received transfer, then relay
    /// the updated hashes when this host is the authoritative participant.
    ///
    /// Failures abort this asset only: the previous entry (if any) stays
    /// active and other transfers are unaffected.
    pub(crate) fn finalize_transfer(
        &mut self,
        from: PeerId,
        name: &str,
        tracker: TransferTracker,
    ) -> Vec<Outbound> {
        if !tracker.reuse_existing_settings {
            if let Some(text) = tracker.settings_text.as_deref() {
                self.settings.apply_raw(name, text);
                if let Err(e) = self.store.save_shared_settings(name, text) {
                    tracing::warn!(name, error = %e, "failed to persist settings");
                }
            }
        }

        if !tracker.reuse_existing_data {
            let bytes = tracker.assembled_data();
            let content_hash = Digest::of(&bytes);

            // Create-on-demand trackers mean a duplicate end-of-stream can
            // complete a second, empty tracker for content that is already
            // installed. Idempotency is keyed on the recomputed hash.
            if self
                .registry
                .get(name)
                .is_some_and(|a| a.content_hash == content_hash && a.source == AssetSource::Received)
            {
                tracing::debug!(name, "asset already installed, skipping finalization");
                return Vec::new();
            }

            let settings = self.settings.get_or_default(name);
            let visual = match self.backend.import(&bytes, settings.model_scale) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(
                        name,
                        %from,
                        bytes = bytes.len(),
                        error = %e,
                        "asset decode failed, keeping previous asset"
                    );
                    return Vec::new();
                }
            };

            let settings_hash = if tracker.reuse_existing_settings {
                // matched during the hash exchange; keep the stored value
                self.registry
                    .get(name)
                    .map(|a| a.settings_hash)
                    .unwrap_or_else(|| settings.digest())
            } else {
                settings.digest()
            };

            let asset = Asset {
                name: name.to_string(),
                content: Some(bytes.clone()),
                content_hash,
                settings_hash,
                source: AssetSource::Received,
                visual,
            };
            if self.registry.register(asset, &self.settings).is_none() {
                self.backend.release(visual);
                return Vec::new();
            }

            if let Err(e) = self.store.save_shared_asset(name, &bytes) {
                tracing::warn!(name, error = %e, "failed to persist asset");
            }
            // Only the authoritative host re-serves chunks; everyone else
            // can drop the raw bytes once hashed and decoded.
            if !self.env.is_authoritative() {
                self.registry.evict_content(name);
            }
            self.backend.install(name, visual);
            tracing::info!(
                name,
                %from,
                bytes = bytes.len(),
                content_hash = %content_hash,
                "received asset installed"
            );
        } else {
            // Settings-only refresh: same visual, new presentation.
            let digest = self.settings.digest_of(name);
            self.registry.set_settings_hash(name, digest);
            if let Some(asset) = self.registry.get(name) {
                self.backend
                    .apply_presentation(asset.visual, &self.settings.get_or_default(name));
            }
        }

        // Transitive fan-out: the relay re-announces to every peer except
        // the asset's owner.
        if self.env.is_authoritative() {
            if let Some(asset) = self.registry.get(name) {
                let owner = self
                    .env
                    .peers()
                    .into_iter()
                    .find(|p| self.env.peer_name(*p).as_deref() == Some(name));
                return self
                    .env
                    .peers()
                    .into_iter()
                    .filter(|peer| Some(*peer) != owner)
                    .map(|peer| {
                        Outbound::to_peer(
                            peer,
                            SyncMessage::Hashes {
                                name: name.to_string(),
                                content_hash: asset.content_hash,
                                settings_hash: asset.settings_hash,
                            },
                        )
                    })
                    .collect();
            }
        }

        Vec::new()
    }
}
