//! The sync controller — announcement timing, inbound dispatch, and the
//! pull-based chunk flow.
//!
//! All state transitions run on one logical thread: the controller is a
//! plain state machine whose methods consume an inbound message (or a tick
//! of the clock) and return the outbound messages to send. Nothing here
//! suspends mid-step, so there are no locks and no races between
//! concurrent transfers.
//!
//! There is deliberately no stall detection: if a message is lost, the
//! affected transfer silently never completes, and the next announcement
//! (on reconnect or re-share) restarts the handshake. Pull chunking means
//! at most one packet is ever in flight per (sender, asset) pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use mantle_core::config::MantleConfig;
use mantle_core::settings::SettingsStore;
use mantle_core::{Digest, PeerId, SyncError, SyncMessage};

use crate::chunker;
use crate::registry::{Asset, AssetRegistry, AssetSource};
use crate::send::Outbound;
use crate::store::AssetStore;
use crate::tracker::TransferTracker;
use crate::visual::{HostEnv, VisualBackend};

/// Deferred single-shot startup actions, armed when the participant
/// becomes active and cancellable until they fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartupAction {
    Announce,
    QueryAll,
}

#[derive(Debug)]
struct PendingAction {
    due: Instant,
    action: StartupAction,
}

pub struct SyncController {
    pub(crate) self_peer: PeerId,
    pub(crate) config: MantleConfig,
    pub(crate) registry: AssetRegistry,
    pub(crate) settings: SettingsStore,
    pub(crate) store: AssetStore,
    pub(crate) env: Arc<dyn HostEnv>,
    pub(crate) backend: Arc<dyn VisualBackend>,

    /// In-flight pulls, keyed by (sender, asset name). Created lazily on
    /// the first relevant inbound message, dropped at finalization.
    pub(crate) loadings: HashMap<(PeerId, String), TransferTracker>,
    pending: Vec<PendingAction>,
}

impl SyncController {
    pub fn new(
        self_peer: PeerId,
        config: MantleConfig,
        env: Arc<dyn HostEnv>,
        backend: Arc<dyn VisualBackend>,
    ) -> Self {
        let store = AssetStore::new(config.storage.data_dir.clone());
        Self {
            self_peer,
            registry: AssetRegistry::new(backend.clone()),
            settings: SettingsStore::new(),
            store,
            config,
            env,
            backend,
            loadings: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Number of in-flight pulls (all senders).
    pub fn active_transfers(&self) -> usize {
        self.loadings.len()
    }

    // ── Local asset setup ─────────────────────────────────────────────────

    /// Load this participant's own asset and settings from local storage
    /// and register them.
    pub fn load_local(&mut self) -> Result<(), SyncError> {
        let name = self.env.local_name();
        if let Some(text) = self.store.load_local_settings(&name) {
            self.settings.apply_raw(&name, &text);
        }
        let bytes = self.store.load_local_asset(&name).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no local asset for {name}"),
            )
        })?;
        self.register_local(&name, bytes)
    }

    /// Register an asset owned by this host under `name`, computing both
    /// digests locally.
    pub fn register_local(&mut self, name: &str, bytes: Bytes) -> Result<(), SyncError> {
        let settings = self.settings.get_or_default(name);
        let visual = self.backend.import(&bytes, settings.model_scale)?;
        let asset = Asset {
            name: name.to_string(),
            content_hash: Digest::of(&bytes),
            settings_hash: settings.digest(),
            content: Some(bytes),
            source: AssetSource::Local,
            visual,
        };
        if self.registry.register(asset, &self.settings).is_some() {
            self.backend.install(name, visual);
            tracing::info!(name, "local asset registered");
        }
        Ok(())
    }

    // ── Startup scheduling ────────────────────────────────────────────────

    /// Arm the delayed initial announcement of the local asset.
    pub fn schedule_share(&mut self, now: Instant) {
        let delay = Duration::from_secs_f64(self.config.sharing.share_delay_secs);
        self.pending.push(PendingAction {
            due: now + delay,
            action: StartupAction::Announce,
        });
    }

    /// Arm the delayed query-all towards the authoritative participant.
    /// No-op when this host is itself authoritative.
    pub fn schedule_query_all(&mut self, now: Instant) {
        if self.env.is_authoritative() {
            return;
        }
        let delay = Duration::from_secs_f64(self.config.sharing.share_delay_secs);
        self.pending.push(PendingAction {
            due: now + delay,
            action: StartupAction::QueryAll,
        });
    }

    /// Cancel all armed startup actions. Cancelled actions are not retried.
    pub fn cancel_pending(&mut self) {
        self.pending.clear();
    }

    /// Drop all protocol state: in-flight trackers, armed startup actions,
    /// registered assets (releasing their visuals), and stored settings.
    /// Invoked by the host on session restart.
    pub fn reset(&mut self) {
        let dropped = self.loadings.len();
        if dropped > 0 {
            tracing::info!(transfers = dropped, "dropping in-flight transfers on reset");
        }
        self.loadings.clear();
        self.pending.clear();
        self.registry.reset();
        self.settings.reset();
    }

    /// Fire every armed action whose delay has elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        let due: Vec<StartupAction> = {
            let (fire, keep): (Vec<_>, Vec<_>) =
                self.pending.drain(..).partition(|p| p.due <= now);
            self.pending = keep;
            fire.into_iter().map(|p| p.action).collect()
        };
        for action in due {
            match action {
                StartupAction::Announce => out.extend(self.announce_now()),
                StartupAction::QueryAll => out.extend(self.query_all_now()),
            }
        }
        out
    }

    /// Announce the local asset's hashes immediately: to every peer when
    /// authoritative, to the authoritative peer otherwise. Silent no-op if
    /// the local asset is missing or sharing is disabled for it.
    pub fn announce_now(&mut self) -> Vec<Outbound> {
        let name = self.env.local_name();
        if !self.settings.get_or_default(&name).allow_share {
            tracing::debug!(name, "sharing disabled for local asset");
            return Vec::new();
        }
        let Some(asset) = self.registry.get(&name) else {
            tracing::debug!(name, "no local asset to announce");
            return Vec::new();
        };

        tracing::info!(
            name,
            content_hash = %asset.content_hash,
            settings_hash = %asset.settings_hash,
            "announcing local asset"
        );

        let msg = SyncMessage::Hashes {
            name,
            content_hash: asset.content_hash,
            settings_hash: asset.settings_hash,
        };
        if self.env.is_authoritative() {
            vec![Outbound::broadcast(msg)]
        } else if let Some(authority) = self.env.authority() {
            vec![Outbound::to_peer(authority, msg)]
        } else {
            Vec::new()
        }
    }

    /// Ask the authoritative participant about every asset it knows.
    pub fn query_all_now(&mut self) -> Vec<Outbound> {
        if self.env.is_authoritative() {
            return Vec::new();
        }
        match self.env.authority() {
            Some(authority) => vec![Outbound::to_peer(authority, SyncMessage::QueryAll)],
            None => Vec::new(),
        }
    }

    // ── Inbound dispatch ──────────────────────────────────────────────────

    /// Process one inbound protocol message and return the replies.
    ///
    /// Messages whose provenance is this controller itself are discarded:
    /// a broadcast loops back through the substrate, and that is a no-op,
    /// not an error.
    pub fn handle_message(&mut self, from: PeerId, msg: SyncMessage) -> Vec<Outbound> {
        if from == self.self_peer {
            tracing::trace!(%from, "ignoring self-delivered message");
            return Vec::new();
        }

        match msg {
            SyncMessage::Hashes {
                name,
                content_hash,
                settings_hash,
            } => self.on_hashes(from, name, content_hash, settings_hash),
            SyncMessage::QueryAll => self.on_query_all(from),
            SyncMessage::QueryData { name } => self.send_packet(from, &name, 0),
            SyncMessage::DataPacket {
                name,
                index,
                total,
                payload,
            } => self.on_data_packet(from, name, index, total, payload),
            SyncMessage::PacketAck { name, index } => self.send_packet(from, &name, index + 1),
            SyncMessage::QuerySettings { name } => self.on_query_settings(from, name),
            SyncMessage::SendSettings { name, text } => self.on_send_settings(from, name, text),
        }
    }

    fn on_hashes(
        &mut self,
        from: PeerId,
        name: String,
        content_hash: Digest,
        settings_hash: Digest,
    ) -> Vec<Outbound> {
        tracing::info!(
            name,
            %from,
            content_hash = %content_hash,
            settings_hash = %settings_hash,
            "received asset hashes"
        );

        // Local policy switch; the authoritative relay accepts regardless,
        // or nothing would ever fan out.
        if !self.config.sharing.accept_remote && !self.env.is_authoritative() {
            tracing::debug!(name, "accepting shared assets is disabled");
            return Vec::new();
        }

        let mut tracker = TransferTracker::new();
        let mut out = Vec::new();

        match self.registry.get(&name) {
            Some(asset) => {
                let data_equal = asset.content_hash == content_hash;
                let settings_equal = asset.settings_hash == settings_hash;
                if data_equal && settings_equal {
                    tracing::debug!(name, "asset is up to date");
                    return Vec::new();
                }
                if data_equal {
                    tracker.reuse_existing_data = true;
                } else {
                    out.push(Outbound::to_peer(
                        from,
                        SyncMessage::QueryData { name: name.clone() },
                    ));
                }
                if settings_equal {
                    tracker.reuse_existing_settings = true;
                } else {
                    out.push(Outbound::to_peer(
                        from,
                        SyncMessage::QuerySettings { name: name.clone() },
                    ));
                }
            }
            None => {
                out.push(Outbound::to_peer(
                    from,
                    SyncMessage::QueryData { name: name.clone() },
                ));
                out.push(Outbound::to_peer(
                    from,
                    SyncMessage::QuerySettings { name: name.clone() },
                ));
            }
        }

        self.loadings.insert((from, name), tracker);
        out
    }

    fn on_query_all(&mut self, from: PeerId) -> Vec<Outbound> {
        let requester = self.env.peer_name(from);
        let mut out = Vec::new();
        for name in self.registry.names() {
            if requester.as_deref() == Some(name.as_str()) {
                continue;
            }
            if !self.settings.get_or_default(&name).allow_share {
                continue;
            }
            if let Some(asset) = self.registry.get(&name) {
                out.push(Outbound::to_peer(
                    from,
                    SyncMessage::Hashes {
                        name,
                        content_hash: asset.content_hash,
                        settings_hash: asset.settings_hash,
                    },
                ));
            }
        }
        tracing::info!(%from, assets = out.len(), "answered query-all");
        out
    }

    /// Send one content packet of `name` to `to`. Past the last chunk (or
    /// when there is nothing to serve) this is the terminal empty packet.
    fn send_packet(&mut self, to: PeerId, name: &str, index: u32) -> Vec<Outbound> {
        let content = self.registry.get(name).and_then(|a| a.content);
        let Some(content) = content else {
            tracing::warn!(name, %to, "no content to serve, ending stream");
            return vec![Outbound::to_peer(
                to,
                SyncMessage::DataPacket {
                    name: name.to_string(),
                    index,
                    total: 0,
                    payload: Bytes::new(),
                },
            )];
        };

        match chunker::chunk_at(&content, self.config.transfer.max_chunk_size, index) {
            Some(chunk) => {
                tracing::debug!(
                    name,
                    %to,
                    packet = chunk.index + 1,
                    of = chunk.total,
                    "sending data packet"
                );
                vec![Outbound::to_peer(
                    to,
                    SyncMessage::DataPacket {
                        name: name.to_string(),
                        index: chunk.index,
                        total: chunk.total,
                        payload: chunk.payload,
                    },
                )]
            }
            None => {
                let total = chunker::total_chunks(content.len(), self.config.transfer.max_chunk_size);
                vec![Outbound::to_peer(
                    to,
                    SyncMessage::DataPacket {
                        name: name.to_string(),
                        index: total,
                        total,
                        payload: Bytes::new(),
                    },
                )]
            }
        }
    }

    fn on_data_packet(
        &mut self,
        from: PeerId,
        name: String,
        index: u32,
        total: u32,
        payload: Bytes,
    ) -> Vec<Outbound> {
        let key = (from, name.clone());
        let tracker = self.loadings.entry(key.clone()).or_default();

        let mut out = Vec::new();
        if payload.is_empty() {
            tracker.data_done = true;
            tracing::info!(name, %from, "received all data packets");
        } else {
            tracker.push_chunk(crate::chunker::Chunk {
                index,
                total,
                payload,
            });
            tracing::debug!(name, %from, packet = index + 1, of = total, "received data packet");
            // Ack drives the flow: exactly one packet in flight.
            out.push(Outbound::to_peer(
                from,
                SyncMessage::PacketAck {
                    name: name.clone(),
                    index,
                },
            ));
        }

        if self.loadings.get(&key).is_some_and(|t| t.is_loaded()) {
            out.extend(self.finish_transfer(from, &name));
        }
        out
    }

    fn on_query_settings(&mut self, from: PeerId, name: String) -> Vec<Outbound> {
        let text = self.settings.get_or_default(&name).diff_only();
        tracing::debug!(name, %from, "sending settings");
        vec![Outbound::to_peer(from, SyncMessage::SendSettings { name, text })]
    }

    fn on_send_settings(&mut self, from: PeerId, name: String, text: String) -> Vec<Outbound> {
        let key = (from, name.clone());
        let tracker = self.loadings.entry(key.clone()).or_default();
        tracker.set_settings(text);
        tracing::info!(name, %from, "received settings");

        if self.loadings.get(&key).is_some_and(|t| t.is_loaded()) {
            self.finish_transfer(from, &name)
        } else {
            Vec::new()
        }
    }

    /// Detach the completed tracker and run finalization exactly once.
    fn finish_transfer(&mut self, from: PeerId, name: &str) -> Vec<Outbound> {
        match self.loadings.remove(&(from, name.to_string())) {
            Some(tracker) => self.finalize_transfer(from, name, tracker),
            None => Vec::new(),
        }
    }
}
